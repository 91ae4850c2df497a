//! Result files for one session.
//!
//! Layout under the output root:
//! `<participant>_SubjData/<experiment>/Output/<stem>_p1.csv` and friends,
//! plus `<participant>_SubjData/<experiment>/Logging/<stem>.log`, where
//! `<stem>` is `<participant>_<experiment>_<date>`.

use crate::error::{EngineError, Result};
use crate::summary::{ConditionSummary, DirectionSummary, summarize_constant, summarize_limits};
use quartet_core::{ConstantRecord, LimitsRecord, SubjectProfile};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    experiment_dir: PathBuf,
    stem: String,
}

impl OutputPaths {
    pub fn new(root: &Path, participant: &str, experiment: &str, date: &str) -> Self {
        Self {
            experiment_dir: root
                .join(format!("{participant}_SubjData"))
                .join(experiment),
            stem: format!("{participant}_{experiment}_{date}"),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.experiment_dir.join("Output")
    }

    pub fn logging_dir(&self) -> PathBuf {
        self.experiment_dir.join("Logging")
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn log_file(&self) -> PathBuf {
        self.logging_dir().join(format!("{}.log", self.stem))
    }

    fn output_file(&self, suffix: &str) -> PathBuf {
        self.output_dir().join(format!("{}_{suffix}", self.stem))
    }

    pub fn limits_csv(&self) -> PathBuf {
        self.output_file("p1.csv")
    }

    pub fn limits_json(&self) -> PathBuf {
        self.output_file("p1.json")
    }

    pub fn constant_csv(&self) -> PathBuf {
        self.output_file("p2.csv")
    }

    pub fn constant_json(&self) -> PathBuf {
        self.output_file("p2.json")
    }

    pub fn constant_summary_csv(&self) -> PathBuf {
        self.output_file("p2_summary.csv")
    }

    pub fn profile_json(&self) -> PathBuf {
        self.output_file("profile.json")
    }

    /// Creates the output and logging folders.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [self.output_dir(), self.logging_dir()] {
            fs::create_dir_all(&dir).map_err(|source| EngineError::Persist { path: dir, source })?;
        }
        Ok(())
    }
}

fn persist_err(path: &Path) -> impl FnOnce(io::Error) -> EngineError + '_ {
    move |source| EngineError::Persist {
        path: path.to_path_buf(),
        source,
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_limits_rows<W: Write>(records: &[LimitsRecord], mut w: W) -> io::Result<()> {
    writeln!(
        w,
        "trial,run,flip_ms,response_delay_ms,feedback_ms,iti_ms,quartet_order,direction,response_key,response_time_s,response_ratio,response_flip"
    )?;
    for r in records {
        let c = &r.condition;
        let resp = r.response.as_ref();
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            c.trial,
            c.run,
            c.flip_ms,
            c.response_delay_ms,
            c.feedback_ms,
            c.iti_ms,
            c.quartet_order.as_str(),
            c.direction,
            opt(resp.map(|x| x.key)),
            opt(resp.map(|x| format!("{:.6}", x.response_time_secs()))),
            opt(resp.map(|x| format!("{:.6}", x.ratio))),
            opt(resp.map(|x| x.flip)),
        )?;
    }
    w.flush()
}

fn write_constant_rows<W: Write>(records: &[ConstantRecord], mut w: W) -> io::Result<()> {
    writeln!(
        w,
        "trial,run,first_frame_ms,flip_ms,cycles,response_delay_ms,report_timeout_ms,feedback_ms,iti_ms,condition,quartet_order,ratio,response_key,response_time_s,response_label"
    )?;
    for r in records {
        let c = &r.condition;
        let resp = r.response.as_ref();
        writeln!(
            w,
            "{},{},{},{},{},{},{},{},{},{},{},{:.6},{},{},{}",
            c.trial,
            c.run,
            c.first_frame_ms,
            c.flip_ms,
            c.cycles,
            c.response_delay_ms,
            opt(c.report_timeout_ms),
            c.feedback_ms,
            c.iti_ms,
            c.condition,
            c.quartet_order.as_str(),
            r.ratio,
            opt(resp.map(|x| x.key)),
            opt(resp.map(|x| format!("{:.6}", x.response_time_secs()))),
            opt(resp.map(|x| x.label.as_str())),
        )?;
    }
    w.flush()
}

fn write_constant_summary_rows<W: Write>(rows: &[ConditionSummary], mut w: W) -> io::Result<()> {
    writeln!(w, "condition,ratio,n,vertical_percent,se_percent")?;
    for s in rows {
        writeln!(
            w,
            "{},{:.6},{},{:.2},{:.2}",
            s.condition, s.ratio, s.n, s.vertical_percent, s.se_percent
        )?;
    }
    w.flush()
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(persist_err(path))
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(persist_err(path))
}

/// Phase 1 table as CSV and JSON.
pub fn save_limits(paths: &OutputPaths, records: &[LimitsRecord]) -> Result<()> {
    let csv = paths.limits_csv();
    write_limits_rows(records, create(&csv)?).map_err(persist_err(&csv))?;
    write_json(records, &paths.limits_json())?;
    info!(path = %csv.display(), trials = records.len(), "phase 1 responses saved");
    Ok(())
}

/// Phase 2 table as CSV and JSON, plus the per-condition summary.
pub fn save_constant(paths: &OutputPaths, records: &[ConstantRecord]) -> Result<()> {
    let csv = paths.constant_csv();
    write_constant_rows(records, create(&csv)?).map_err(persist_err(&csv))?;
    write_json(records, &paths.constant_json())?;
    let summary = paths.constant_summary_csv();
    write_constant_summary_rows(&summarize_constant(records), create(&summary)?)
        .map_err(persist_err(&summary))?;
    info!(path = %csv.display(), trials = records.len(), "phase 2 responses saved");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProfileReport<'a> {
    profile: &'a SubjectProfile,
    overall_mean_ratio: f64,
    phase1: Vec<DirectionSummary>,
}

/// Subject profile with the Phase 1 descriptive statistics it came from.
pub fn save_profile(
    paths: &OutputPaths,
    profile: &SubjectProfile,
    records: &[LimitsRecord],
) -> Result<()> {
    let path = paths.profile_json();
    let report = ProfileReport {
        profile,
        overall_mean_ratio: profile.overall_mean_ratio(),
        phase1: summarize_limits(records),
    };
    write_json(&report, &path)?;
    info!(path = %path.display(), "subject profile saved");
    Ok(())
}
