use crate::error::{Error, Result};
use crate::model::Model;
use csv::{QuoteStyle, WriterBuilder};
use getset::Setters;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// CSV emitter for `run_multiple`. The path format must contain `%i`,
/// replaced with the replicate index; one file per enabled artifact is
/// written per replicate, with string fields quoted.
///
/// ```no_run
/// use epiabm::prelude::*;
///
/// let saver = SaveRun::new("out/run_%i")?;
/// # let mut model = Model::new();
/// model.run_multiple(100, 4, 1231, Some(|r, m: &Model| saver.save(r, m)), true, true, 2)?;
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug, Clone, Setters)]
#[getset(set = "pub")]
pub struct SaveRun {
    fmt: String,
    total_hist: bool,
    virus_info: bool,
    virus_hist: bool,
    tool_hist: bool,
    transmission: bool,
    transition: bool,
    reproductive: bool,
    generation: bool,
    outbreak_size: bool,
    active_cases: bool,
    hospitalizations: bool,
}

impl SaveRun {
    /// All artifacts enabled; switch individual ones off with the
    /// `set_*` setters.
    pub fn new(fmt: impl Into<String>) -> Result<Self> {
        let fmt = fmt.into();
        if !fmt.contains("%i") {
            return Err(Error::InvalidArgument(format!(
                "saver format '{}' does not contain the replicate marker %i",
                fmt
            )));
        }
        Ok(SaveRun {
            fmt,
            total_hist: true,
            virus_info: true,
            virus_hist: true,
            tool_hist: true,
            transmission: true,
            transition: true,
            reproductive: true,
            generation: true,
            outbreak_size: true,
            active_cases: true,
            hospitalizations: true,
        })
    }

    /// Write the enabled artifacts of one finished replicate.
    pub fn save(&self, rep: usize, model: &Model) -> Result<()> {
        let base = self.fmt.replace("%i", &rep.to_string());
        let db = model.db();

        if self.total_hist {
            write_rows(&path(&base, "total_hist"), db.hist_total())?;
        }
        if self.virus_info {
            write_rows(&path(&base, "virus_info"), &db.virus_info())?;
        }
        if self.virus_hist {
            write_rows(&path(&base, "virus_hist"), db.hist_virus())?;
        }
        if self.tool_hist {
            write_rows(&path(&base, "tool_hist"), db.hist_tool())?;
        }
        if self.transmission {
            write_rows(&path(&base, "transmission"), db.transmissions())?;
        }
        if self.transition {
            write_rows(&path(&base, "transition"), db.hist_transition())?;
        }
        if self.reproductive {
            write_rows(&path(&base, "reproductive"), &db.reproductive_rows())?;
        }
        if self.generation {
            write_rows(&path(&base, "generation"), &db.generation_rows())?;
        }
        if self.outbreak_size {
            write_rows(&path(&base, "outbreak_size"), db.outbreak_sizes())?;
        }
        if self.active_cases {
            write_rows(&path(&base, "active_cases"), db.active_cases())?;
        }
        if self.hospitalizations {
            write_rows(&path(&base, "hospitalizations"), db.hospitalizations())?;
        }
        Ok(())
    }
}

fn path(base: &str, artifact: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}.csv", base, artifact))
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}


#[cfg(test)]
mod io_tests {
    use super::*;
    use crate::models::sir;
    use std::fs;

    #[test]
    fn csv_outputs_quote_string_fields() {
        let dir = std::env::temp_dir().join("epiabm-saver-test");
        let _ = fs::remove_dir_all(&dir);
        let fmt = format!("{}/run_%i", dir.display());
        let saver = SaveRun::new(fmt).unwrap();

        let mut model = sir("a virus", 0.05, 0.9, 0.3).unwrap();
        model.seed(7);
        model.agents_smallworld(200, 4, 0.01, false).unwrap();
        model
            .run_multiple(10, 2, 55, Some(|r: usize, m: &Model| saver.save(r, m)), true, false, 1)
            .unwrap();

        for rep in 0..2 {
            let total = fs::read_to_string(dir.join(format!("run_{}_total_hist.csv", rep))).unwrap();
            assert!(total.lines().next().unwrap().contains("date"));
            assert!(total.contains("\"Susceptible\""), "{}", total);

            let info = fs::read_to_string(dir.join(format!("run_{}_virus_info.csv", rep))).unwrap();
            assert!(info.contains("\"a virus\""));

            for artifact in [
                "virus_hist",
                "tool_hist",
                "transmission",
                "transition",
                "reproductive",
                "generation",
                "outbreak_size",
                "active_cases",
                "hospitalizations",
            ]
            .iter()
            {
                let path = dir.join(format!("run_{}_{}.csv", rep, artifact));
                assert!(path.exists(), "missing {}", path.display());
            }
        }
    }
}
