use std::collections::HashMap;

use sea_orm::prelude::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::competition::ScoreSort;
use crate::entity::{competition_participation, entry, vote};
use crate::error::AppError;
use crate::utils::scoring::{
    DISQUALIFIED_SCORE, RankOrder, Ranked, Scored, dense_rank, with_archive_override,
};

/// `entry_id -> sum(1/rank)` over every ballot cast in the compo.
pub async fn compo_vote_scores<C: ConnectionTrait>(
    db: &C,
    compo_id: i32,
) -> Result<HashMap<i32, f64>, AppError> {
    let rows: Vec<(i32, f64)> = vote::Entity::find()
        .select_only()
        .column(vote::Column::EntryId)
        .column_as(
            Expr::cust(r#"CAST(SUM(1.0 / "vote"."rank") AS DOUBLE PRECISION)"#),
            "score",
        )
        .filter(vote::Column::CompoId.eq(compo_id))
        .group_by(vote::Column::EntryId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Live score and dense rank of every entry. Entries without votes score
/// 0 and disqualified ones score [`DISQUALIFIED_SCORE`].
pub fn rank_entries(
    entries: Vec<entry::Model>,
    scores: &HashMap<i32, f64>,
) -> Vec<Ranked<entry::Model>> {
    let rows = entries
        .into_iter()
        .map(|e| Scored {
            score: if e.disqualified {
                DISQUALIFIED_SCORE
            } else {
                scores.get(&e.id).copied().unwrap_or(0.0)
            },
            disqualified: e.disqualified,
            item: e,
        })
        .collect();
    dense_rank(rows, RankOrder::HighestFirst)
}

/// Like [`rank_entries`], then frozen archive values replace the live
/// ones and the list is re-sorted by the resulting rank.
pub fn rank_entries_with_archive(
    entries: Vec<entry::Model>,
    scores: &HashMap<i32, f64>,
) -> Vec<Ranked<entry::Model>> {
    let mut ranked: Vec<Ranked<entry::Model>> = rank_entries(entries, scores)
        .into_iter()
        .map(|r| {
            let (score, rank) = with_archive_override(
                r.score,
                r.rank,
                r.item.archive_score,
                r.item.archive_rank,
            );
            Ranked {
                item: r.item,
                score,
                rank,
            }
        })
        .collect();
    ranked.sort_by_key(|r| r.rank);
    ranked
}

/// Load a compo's entries and rank them.
pub async fn compo_results<C: ConnectionTrait>(
    db: &C,
    compo_id: i32,
) -> Result<Vec<Ranked<entry::Model>>, AppError> {
    let entries = entry::Entity::find()
        .filter(entry::Column::CompoId.eq(compo_id))
        .all(db)
        .await?;
    let scores = compo_vote_scores(db, compo_id).await?;
    Ok(rank_entries_with_archive(entries, &scores))
}

pub fn rank_participations(
    participations: Vec<competition_participation::Model>,
    sort: ScoreSort,
) -> Vec<Ranked<competition_participation::Model>> {
    let order = match sort {
        ScoreSort::HighestFirst => RankOrder::HighestFirst,
        ScoreSort::LowestFirst => RankOrder::LowestFirst,
    };
    let rows = participations
        .into_iter()
        .map(|p| Scored {
            score: p.score,
            disqualified: p.disqualified,
            item: p,
        })
        .collect();
    dense_rank(rows, order)
}
