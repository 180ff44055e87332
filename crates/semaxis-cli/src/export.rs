//! Run directory allocation and the files written into it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use semaxis_core::columns::InputRecord;
use semaxis_core::controller::{RunReport, ScoredAssignment};
use semaxis_core::explorer::{Candidate, ShortlistEvaluation};

pub const SCORES_FILE: &str = "scores.csv";
pub const REPORT_FILE: &str = "report.json";
pub const CANDIDATES_FILE: &str = "k_candidates.csv";
pub const SHORTLIST_FILE: &str = "k_candidates_stage2.csv";
pub const ASSIGNMENTS_FILE: &str = "k_candidates_assignments.csv";
pub const NAMING_PROMPT_FILE: &str = "naming_prompt.md";

/// Rows listed per cluster in the naming prompt.
pub const NAMING_TOP_N: usize = 5;

/// Create `root/run_<project>_<NN>` with the first unused index, starting at 01.
pub fn allocate_run_dir(root: &Path, project: &str) -> Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("creating {}", root.display()))?;
    for index in 1u32.. {
        let dir = root.join(format!("run_{}_{:02}", project, index));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_context(|| format!("creating {}", dir.display())),
        }
    }
    anyhow::bail!("no free run directory index under {}", root.display())
}

/// `id, text, IC1..ICm, cluster, dist[, novel]`; at most `max_ic_cols` IC columns.
pub fn write_scores(
    dir: &Path,
    records: &[InputRecord],
    scored: &ScoredAssignment,
    max_ic_cols: Option<usize>,
) -> Result<PathBuf> {
    let path = dir.join(SCORES_FILE);
    let width = scored.coords.first().map(Vec::len).unwrap_or(0);
    let ic_cols = max_ic_cols.map(|m| m.min(width)).unwrap_or(width);

    let mut writer = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["id".to_string(), "text".to_string()];
    header.extend((1..=ic_cols).map(|i| format!("IC{}", i)));
    header.extend(["cluster".to_string(), "dist".to_string()]);
    if scored.novel.is_some() {
        header.push("novel".to_string());
    }
    writer.write_record(&header)?;

    for (i, record) in records.iter().enumerate() {
        let mut row = vec![record.id.clone(), record.text.clone()];
        row.extend(scored.coords[i][..ic_cols].iter().map(|v| format!("{:.6}", v)));
        row.push(scored.assignment.cluster_ids[i].to_string());
        row.push(format!("{:.6}", scored.assignment.distances[i]));
        if let Some(novel) = &scored.novel {
            row.push(novel[i].to_string());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn write_report(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[derive(Serialize)]
struct CandidateRow {
    rank: usize,
    d1: usize,
    k: usize,
    cohesion: f64,
    separation: f64,
    inverse_spread: f64,
    spread: f64,
    rank_cohesion: usize,
    rank_separation: usize,
    rank_inverse_spread: usize,
    rank_aggregate: f64,
}

/// Ranked grid; `rank` is the plan number.
pub fn write_candidates(dir: &Path, candidates: &[Candidate]) -> Result<PathBuf> {
    let path = dir.join(CANDIDATES_FILE);
    let mut writer = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    for (i, c) in candidates.iter().enumerate() {
        writer.serialize(CandidateRow {
            rank: i + 1,
            d1: c.d1,
            k: c.k,
            cohesion: c.scores.cohesion,
            separation: c.scores.separation,
            inverse_spread: c.scores.inverse_spread,
            spread: c.scores.spread,
            rank_cohesion: c.ranks.cohesion,
            rank_separation: c.ranks.separation,
            rank_inverse_spread: c.ranks.inverse_spread,
            rank_aggregate: c.ranks.aggregate,
        })?;
    }
    writer.flush()?;
    Ok(path)
}

#[derive(Serialize)]
struct ShortlistCsvRow {
    plan: usize,
    d1: usize,
    d2: usize,
    k: usize,
    cohesion: f64,
    separation: f64,
    inverse_spread: f64,
    spread: f64,
    rank_aggregate: f64,
}

pub fn write_shortlist(dir: &Path, shortlist: &ShortlistEvaluation) -> Result<PathBuf> {
    let path = dir.join(SHORTLIST_FILE);
    let mut writer = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    for r in &shortlist.rows {
        writer.serialize(ShortlistCsvRow {
            plan: r.plan,
            d1: r.d1,
            d2: r.d2,
            k: r.k,
            cohesion: r.scores.cohesion,
            separation: r.scores.separation,
            inverse_spread: r.scores.inverse_spread,
            spread: r.scores.spread,
            rank_aggregate: r.ranks.aggregate,
        })?;
    }
    writer.flush()?;
    Ok(path)
}

/// `id, text, cand<p>_K<k>...` for every shortlisted plan.
pub fn write_assignments(dir: &Path, records: &[InputRecord], shortlist: &ShortlistEvaluation) -> Result<PathBuf> {
    let path = dir.join(ASSIGNMENTS_FILE);
    let mut writer = csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec!["id".to_string(), "text".to_string()];
    header.extend(shortlist.assignments.iter().map(|a| a.column_name()));
    writer.write_record(&header)?;
    for (i, record) in records.iter().enumerate() {
        let mut row = vec![record.id.clone(), record.text.clone()];
        row.extend(shortlist.assignments.iter().map(|a| a.cluster_ids[i].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Markdown listing the `top_n` rows nearest each centroid, for a naming pass.
pub fn write_naming_prompt(
    dir: &Path,
    records: &[InputRecord],
    scored: &ScoredAssignment,
    clusters: usize,
    top_n: usize,
) -> Result<PathBuf> {
    let path = dir.join(NAMING_PROMPT_FILE);
    fs::write(&path, naming_prompt(records, scored, clusters, top_n))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn naming_prompt(records: &[InputRecord], scored: &ScoredAssignment, clusters: usize, top_n: usize) -> String {
    let mut out = String::from("# Cluster naming\n\n");
    out.push_str(
        "Give each cluster a short name (a few words) and a one-sentence description, \
         based on the texts closest to its center. Distances are cosine distances.\n",
    );
    for cluster in 0..clusters {
        let mut members: Vec<(usize, f64)> = scored
            .assignment
            .cluster_ids
            .iter()
            .zip(&scored.assignment.distances)
            .enumerate()
            .filter(|(_, (c, _))| **c == cluster)
            .map(|(i, (_, d))| (i, *d))
            .collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        out.push_str(&format!("\n## Cluster {} ({} rows)\n\n", cluster, members.len()));
        if members.is_empty() {
            out.push_str("_No rows assigned in this run._\n");
            continue;
        }
        for (rank, (i, d)) in members.iter().take(top_n).enumerate() {
            out.push_str(&format!(
                "{}. [{}] ({:.4}) {}\n",
                rank + 1,
                records[*i].id,
                d,
                records[*i].text
            ));
        }
        out.push_str("\nName:\nDescription:\n");
    }
    out
}

/// Write every file a run produces; returns the run directory.
pub fn export_run(
    root: &Path,
    records: &[InputRecord],
    outcome: &semaxis_core::RunOutcome,
    max_ic_cols: Option<usize>,
) -> Result<PathBuf> {
    let report = &outcome.report;
    let dir = allocate_run_dir(root, &report.project)?;

    if let Some(scored) = &outcome.scored {
        write_scores(&dir, records, scored, max_ic_cols)?;
        let clusters = report.k.unwrap_or_else(|| {
            scored.assignment.cluster_ids.iter().max().map(|m| m + 1).unwrap_or(0)
        });
        write_naming_prompt(&dir, records, scored, clusters, NAMING_TOP_N)?;
    }
    if let Some(exploration) = &outcome.exploration {
        write_candidates(&dir, &exploration.candidates)?;
    }
    if let Some(shortlist) = &outcome.shortlist {
        write_shortlist(&dir, shortlist)?;
        write_assignments(&dir, records, shortlist)?;
    }
    write_report(&dir, report)?;

    info!(target: "semaxis::export", dir = %dir.display(), mode = ?report.mode, "Run exported");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use semaxis_core::clustering::Assignment;

    fn records(n: usize) -> Vec<InputRecord> {
        (0..n)
            .map(|i| InputRecord {
                id: format!("r{}", i),
                text: format!("text {}", i),
            })
            .collect()
    }

    fn scored(novel: Option<Vec<bool>>) -> ScoredAssignment {
        ScoredAssignment {
            coords: vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6], vec![0.7, 0.8, 0.9]],
            assignment: Assignment {
                cluster_ids: vec![1, 0, 1],
                distances: vec![0.3, 0.1, 0.05],
            },
            novel,
        }
    }

    #[test]
    fn test_run_dirs_are_numbered_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let a = allocate_run_dir(tmp.path(), "survey").unwrap();
        let b = allocate_run_dir(tmp.path(), "survey").unwrap();
        assert!(a.ends_with("run_survey_01"));
        assert!(b.ends_with("run_survey_02"));
    }

    #[test]
    fn test_scores_header_caps_ic_columns_and_adds_novel() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_scores(tmp.path(), &records(3), &scored(Some(vec![false, true, false])), Some(2)).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "id,text,IC1,IC2,cluster,dist,novel");
        assert_eq!(lines.next().unwrap(), "r0,text 0,0.100000,0.200000,1,0.300000,false");
    }

    #[test]
    fn test_naming_prompt_orders_by_distance() {
        let prompt = naming_prompt(&records(3), &scored(None), 3, 5);
        let c1 = prompt.find("## Cluster 1").unwrap();
        let r2 = prompt[c1..].find("[r2]").unwrap();
        let r0 = prompt[c1..].find("[r0]").unwrap();
        assert!(r2 < r0, "nearest row first:\n{}", prompt);
        assert!(prompt.contains("## Cluster 2 (0 rows)"));
    }
}
