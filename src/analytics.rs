//! Most and least viewed videos per publish year, globally and per region.
//!
//! Read-only over the merged datasets. The region of a file is the first
//! characters of its file name (`USvideos.csv` is `US`).

use crate::ingest::Dataset;
use crate::report::{group_digits, Table};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Ranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Publish years to rank, matched as a prefix of the date column
    #[serde(default = "default_years")]
    pub years: Vec<i32>,

    /// Videos listed per table
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_views_column")]
    pub views_column: String,

    #[serde(default = "default_date_column")]
    pub date_column: String,

    #[serde(default = "default_title_column")]
    pub title_column: String,

    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// File name characters that make up the region code
    #[serde(default = "default_region_prefix_len")]
    pub region_prefix_len: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            years: default_years(),
            top_n: default_top_n(),
            views_column: default_views_column(),
            date_column: default_date_column(),
            title_column: default_title_column(),
            id_column: default_id_column(),
            region_prefix_len: default_region_prefix_len(),
        }
    }
}

fn default_years() -> Vec<i32> { vec![2017, 2018] }
fn default_top_n() -> usize { 2 }
fn default_views_column() -> String { "views".to_string() }
fn default_date_column() -> String { "publish_time".to_string() }
fn default_title_column() -> String { "title".to_string() }
fn default_id_column() -> String { "video_id".to_string() }
fn default_region_prefix_len() -> usize { 2 }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedVideo {
    pub title: String,
    pub video_id: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Region(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    MostViewed,
    LeastViewed,
}

/// One ranked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub scope: Scope,
    pub year: i32,
    pub order: Order,
    pub videos: Vec<RankedVideo>,
}

impl Ranking {
    pub fn title(&self) -> String {
        let order = match self.order {
            Order::MostViewed => "Most viewed",
            Order::LeastViewed => "Least viewed",
        };
        match &self.scope {
            Scope::Global => format!("{} videos globally in {}", order, self.year),
            Scope::Region(region) => format!("{} videos in region {} in {}", order, region, self.year),
        }
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new(self.title()).columns(["Title", "ID", "Views"]);
        for video in &self.videos {
            table.add_row([video.title.clone(), video.video_id.clone(), group_digits(video.views)]);
        }
        write!(f, "{}", table)
    }
}

/// Video fields of one row, with its publish date.
struct Candidate<'a> {
    published: &'a str,
    video: RankedVideo,
}

pub struct AnalyticsReporter {
    config: AnalyticsConfig,
}

impl AnalyticsReporter {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Region code derived from a file name.
    pub fn region_of(&self, path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().chars().take(self.config.region_prefix_len).collect())
            .unwrap_or_default()
    }

    /// Global rankings for every configured year, then per-file regional
    /// rankings in input order. Years with no rows produce no tables.
    pub fn rank(&self, datasets: &[(PathBuf, Dataset)]) -> Vec<Ranking> {
        let per_file: Vec<Vec<Candidate<'_>>> = datasets
            .iter()
            .map(|(path, dataset)| self.candidates(path, dataset))
            .collect();

        let mut rankings = Vec::new();
        for &year in &self.config.years {
            let global: Vec<&Candidate<'_>> = per_file.iter().flatten().collect();
            self.push_rankings(&mut rankings, Scope::Global, year, &global);
        }

        for ((path, _), candidates) in datasets.iter().zip(&per_file) {
            let region = self.region_of(path);
            for &year in &self.config.years {
                let all: Vec<&Candidate<'_>> = candidates.iter().collect();
                self.push_rankings(&mut rankings, Scope::Region(region.clone()), year, &all);
            }
        }

        rankings
    }

    /// All ranking tables, separated by blank lines.
    pub fn render(&self, datasets: &[(PathBuf, Dataset)]) -> String {
        self.rank(datasets)
            .iter()
            .map(|ranking| ranking.to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn candidates<'a>(&self, path: &Path, dataset: &'a Dataset) -> Vec<Candidate<'a>> {
        let columns = (
            dataset.column(&self.config.views_column),
            dataset.column(&self.config.date_column),
            dataset.column(&self.config.title_column),
            dataset.column(&self.config.id_column),
        );
        let (Some(views), Some(date), Some(title), Some(id)) = columns else {
            if !dataset.is_empty() {
                tracing::debug!("{} lacks the ranking columns; skipping", path.display());
            }
            return Vec::new();
        };

        let mut skipped = 0usize;
        let candidates: Vec<Candidate<'a>> = dataset
            .rows
            .iter()
            .filter_map(|row| {
                let parsed = dataset.field(row, views).trim().parse::<u64>();
                let Ok(count) = parsed else {
                    skipped += 1;
                    return None;
                };
                Some(Candidate {
                    published: dataset.field(row, date),
                    video: RankedVideo {
                        title: dataset.field(row, title).to_string(),
                        video_id: dataset.field(row, id).to_string(),
                        views: count,
                    },
                })
            })
            .collect();

        if skipped > 0 {
            tracing::debug!("{}: {} rows with unreadable views", path.display(), skipped);
        }
        candidates
    }

    fn push_rankings(
        &self,
        rankings: &mut Vec<Ranking>,
        scope: Scope,
        year: i32,
        candidates: &[&Candidate<'_>],
    ) {
        let prefix = year.to_string();
        let mut videos: Vec<&RankedVideo> = candidates
            .iter()
            .filter(|c| c.published.starts_with(&prefix))
            .map(|c| &c.video)
            .collect();
        if videos.is_empty() {
            return;
        }

        // stable, so ties keep file order
        videos.par_sort_by(|a, b| b.views.cmp(&a.views));
        let top = videos.iter().take(self.config.top_n).map(|v| (*v).clone()).collect();

        videos.par_sort_by(|a, b| a.views.cmp(&b.views));
        let bottom = videos.iter().take(self.config.top_n).map(|v| (*v).clone()).collect();

        rankings.push(Ranking {
            scope: scope.clone(),
            year,
            order: Order::MostViewed,
            videos: top,
        });
        rankings.push(Ranking {
            scope,
            year,
            order: Order::LeastViewed,
            videos: bottom,
        });
    }
}
