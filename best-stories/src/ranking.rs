use crate::types::{StoryDetail, StoryId};

/// Highest scoring loaded stories first, at most `count` of them.
///
/// Equal scores are ordered by ascending id so the same cache contents always
/// produce the same answer.
pub fn top_stories<'a, I>(stories: I, count: usize) -> Vec<StoryDetail>
where
    I: IntoIterator<Item = (StoryId, &'a StoryDetail)>,
{
    let mut ranked: Vec<(StoryId, &StoryDetail)> = stories.into_iter().collect();
    ranked.sort_by(|(a_id, a), (b_id, b)| b.score.cmp(&a.score).then(a_id.cmp(b_id)));

    ranked
        .into_iter()
        .take(count)
        .map(|(_, detail)| detail.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::sample_story;

    #[test]
    fn truncates_to_highest_scores() {
        let stories = [(1, sample_story(1, 10)), (2, sample_story(2, 50)), (3, sample_story(3, 30))];

        let top = top_stories(stories.iter().map(|(id, s)| (*id, s)), 2);

        let scores: Vec<i64> = top.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![50, 30]);
    }

    #[test]
    fn equal_scores_break_ties_by_id() {
        let stories = [(30, sample_story(30, 5)), (10, sample_story(10, 5)), (20, sample_story(20, 5))];

        let top = top_stories(stories.iter().map(|(id, s)| (*id, s)), 3);

        let titles: Vec<&str> = top.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Story 10", "Story 20", "Story 30"]);
    }

    #[test]
    fn count_larger_than_cache_returns_everything() {
        let stories = [(1, sample_story(1, 1))];
        assert_eq!(top_stories(stories.iter().map(|(id, s)| (*id, s)), 10).len(), 1);
        assert!(top_stories(stories.iter().map(|(id, s)| (*id, s)), 0).is_empty());
    }
}
