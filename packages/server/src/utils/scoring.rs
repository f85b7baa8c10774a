use std::cmp::Ordering;

/// Scores closer than this are treated as a tie. Compo scores are sums
/// of `1/rank`, so summation order can differ in the last bits.
const TIE_EPSILON: f64 = 1e-9;

/// Score reported for disqualified compo entries.
pub const DISQUALIFIED_SCORE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    HighestFirst,
    LowestFirst,
}

/// Input row for [`dense_rank`].
#[derive(Debug, Clone)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
    pub disqualified: bool,
}

#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    pub score: f64,
    pub rank: i32,
}

/// Borda-like ballot weight: first place is worth 1, second 1/2, ...
pub fn ballot_points(rank: i32) -> f64 {
    if rank <= 0 { 0.0 } else { 1.0 / f64::from(rank) }
}

fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() < TIE_EPSILON
}

/// Dense ranking: equal scores share a rank and the next distinct score
/// gets the following integer. Disqualified rows come after every
/// qualified row and share one rank. Input order breaks ties in output
/// order.
pub fn dense_rank<T>(rows: Vec<Scored<T>>, order: RankOrder) -> Vec<Ranked<T>> {
    let (mut qualified, disqualified): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| !r.disqualified);

    qualified.sort_by(|a, b| {
        let ord = a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal);
        match order {
            RankOrder::HighestFirst => ord.reverse(),
            RankOrder::LowestFirst => ord,
        }
    });

    let mut ranked = Vec::with_capacity(qualified.len() + disqualified.len());
    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for row in qualified {
        if previous.is_none_or(|p| !same_score(p, row.score)) {
            rank += 1;
            previous = Some(row.score);
        }
        ranked.push(Ranked {
            item: row.item,
            score: row.score,
            rank,
        });
    }

    let last = rank + 1;
    ranked.extend(disqualified.into_iter().map(|row| Ranked {
        item: row.item,
        score: row.score,
        rank: last,
    }));
    ranked
}

/// Frozen archive values win over live computation, field by field.
pub fn with_archive_override(
    computed_score: f64,
    computed_rank: i32,
    archive_score: Option<f64>,
    archive_rank: Option<i32>,
) -> (f64, i32) {
    (
        archive_score.unwrap_or(computed_score),
        archive_rank.unwrap_or(computed_rank),
    )
}
