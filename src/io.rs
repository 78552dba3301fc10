use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

use crate::pipeline::GenerationReport;

/// `<timestamp>-<slug>.json` for one run's report.
pub fn report_file_name(report: &GenerationReport) -> String {
    let ts = report.created_at.format("%Y%m%d_%H%M%S");
    let mut slug = slug::slugify(&report.title);
    slug.truncate(60);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{ts}.json")
    } else {
        format!("{ts}-{slug}.json")
    }
}

/// Writes the report as pretty JSON, atomically via a temp file.
pub async fn save_report(out_dir: &Path, report: &GenerationReport) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir).await?;

    let path = out_dir.join(report_file_name(report));
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(report)?;
    {
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(&bytes).await?;
        let _ = f.sync_all().await; // best-effort
    }
    fs::rename(&tmp, &path).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::ProductCopy;
    use crate::pipeline::ReferenceSummary;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn report(title: &str) -> GenerationReport {
        GenerationReport {
            run_id: "run-1".into(),
            title: title.into(),
            created_at: chrono::Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap(),
            reference: ReferenceSummary { name: "ref.png".into(), width: 4, height: 4 },
            copy: ProductCopy { product_title: Some("Soap".into()), ..Default::default() },
            channels: Vec::new(),
        }
    }

    #[test]
    fn file_name_uses_timestamp_and_slug() {
        assert_eq!(report_file_name(&report("Bare Anatomy EXPERT Conditioner!")), "20250304_050607-bare-anatomy-expert-conditioner.json");
        assert_eq!(report_file_name(&report("???")), "20250304_050607.json");
    }

    #[tokio::test]
    async fn save_writes_json_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_report(dir.path(), &report("Soap")).await.unwrap();
        let txt = tokio::fs::read_to_string(&path).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&txt).unwrap();
        assert_eq!(v["copy"]["product_title"], "Soap");
        assert_eq!(v["run_id"], "run-1");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
