use std::cmp::Ordering;

/// An entry's place in one competition.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionRank<T> {
    pub item: T,
    pub score: f64,
    pub rank: usize,
    pub prize: bool,
}

/// Assigns standard competition ranks ("1224") to an already ordered
/// sequence. Tied scores share a rank and the next score skips ahead by the
/// size of the tie. An entry wins a prize when it scored and its rank is
/// within `prize_count`; a tie at the boundary wins together.
///
/// `items` should be sorted by descending score; this function never
/// reorders. A score higher than the one before it is ranked as if it were
/// lower, so callers that cannot guarantee the order go through [`rank_by`].
pub fn rank<T>(
    items: impl IntoIterator<Item = T>,
    score_of: impl Fn(&T) -> f64,
    prize_count: usize,
) -> Vec<CompetitionRank<T>> {
    let mut ranked = Vec::new();
    let mut current: Option<f64> = None;
    let mut rank = 1;
    let mut run_length = 0;

    for item in items {
        let score = score_of(&item);
        match current {
            Some(running) if score == running => run_length += 1,
            _ => {
                rank += run_length;
                run_length = 1;
                current = Some(score);
            }
        }

        ranked.push(CompetitionRank {
            item,
            score,
            rank,
            prize: score > 0.0 && rank <= prize_count,
        });
    }

    ranked
}

/// Sorts with the caller's tie-break chain, then ranks.
pub fn rank_by<T>(
    mut items: Vec<T>,
    order: impl FnMut(&T, &T) -> Ordering,
    score_of: impl Fn(&T) -> f64,
    prize_count: usize,
) -> Vec<CompetitionRank<T>> {
    items.sort_by(order);
    rank(items, score_of, prize_count)
}

/// Higher first.
pub fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

pub fn winners<T>(ranked: &[CompetitionRank<T>]) -> impl Iterator<Item = &CompetitionRank<T>> {
    ranked.iter().filter(|r| r.prize)
}
