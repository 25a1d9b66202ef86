//! CSV / JSON 输出
//!
//! CSV 列固定，复合字段（价格阶梯、属性表、图片列表）编码为 JSON 字符串
//! 放进单元格。引号和换行按 RFC 4180 转义，Excel 可直接打开。

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::models::DetailRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// CSV 表头，顺序即列顺序
const CSV_FIELDS: &[&str] = &[
    "img",
    "description",
    "price",
    "company",
    "product_url",
    "min_order",
    "detailed_description_text",
    "detailed_description_html",
    "prices",
    "attributes",
    "packaging_info",
    "delivery_lead_times",
    "images",
    "original_product_id",
    "category_id",
    "alibaba_detail_url",
    "supplier_name",
    "supplier_type",
    "supplier_years",
    "supplier_location",
    "supplier_performance",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{}\"", escaped)?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn json_cell<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn record_to_row(record: &DetailRecord) -> Result<Vec<String>> {
    let c = &record.candidate;
    let d = &record.details;
    let supplier = d.supplier_info.clone().unwrap_or_default();

    Ok(vec![
        opt(&c.img),
        opt(&c.description),
        opt(&c.price),
        opt(&c.company),
        opt(&c.product_url),
        opt(&c.min_order),
        opt(&d.detailed_description_text),
        opt(&d.detailed_description_html),
        json_cell(&d.prices)?,
        json_cell(&d.attributes)?,
        json_cell(&d.packaging_info)?,
        json_cell(&d.delivery_lead_times)?,
        json_cell(&d.images)?,
        c.original_product_id.to_string(),
        opt(&c.category_id),
        opt(&record.alibaba_detail_url),
        opt(&supplier.name),
        opt(&supplier.supplier_type),
        opt(&supplier.years_on_alibaba),
        opt(&supplier.location),
        json_cell(&supplier.performance)?,
    ])
}

/// 结果落盘器，一次运行写一套文件
pub struct ResultWriter {
    csv_path: String,
    json_path: String,
    images_report_path: String,
}

impl ResultWriter {
    pub fn new(config: &Config) -> Self {
        Self {
            csv_path: config.output_csv_file.clone(),
            json_path: config.output_json_file(),
            images_report_path: config.output_images_report.clone(),
        }
    }

    /// 写 CSV 主输出，覆盖旧文件
    pub fn write_csv(&self, records: &[DetailRecord]) -> Result<()> {
        let file = File::create(&self.csv_path)
            .map_err(|e| ScrapeError::file(&self.csv_path, e))?;
        let mut writer = BufWriter::new(file);

        let header: Vec<String> = CSV_FIELDS.iter().map(|s| s.to_string()).collect();
        write_row(&mut writer, &header).map_err(|e| ScrapeError::file(&self.csv_path, e))?;

        for record in records {
            let row = record_to_row(record)?;
            write_row(&mut writer, &row).map_err(|e| ScrapeError::file(&self.csv_path, e))?;
        }
        writer
            .flush()
            .map_err(|e| ScrapeError::file(&self.csv_path, e))?;

        info!("💾 CSV 已写入: {} ({} 条记录)", self.csv_path, records.len());
        Ok(())
    }

    /// 写 JSON 镜像输出
    pub fn write_json(&self, records: &[DetailRecord]) -> Result<()> {
        let body = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.json_path, body)
            .map_err(|e| ScrapeError::file(&self.json_path, e))?;
        info!("💾 JSON 已写入: {}", self.json_path);
        Ok(())
    }

    /// 写图片清单报告，便于人工抽查图片质量
    pub fn write_images_report(&self, records: &[DetailRecord]) -> Result<()> {
        let mut lines = Vec::new();
        let mut total = 0usize;

        lines.push(format!(
            "生成时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        lines.push(String::new());

        for record in records {
            let title = record
                .candidate
                .description
                .as_deref()
                .unwrap_or("(无标题)");
            lines.push(format!(
                "=== {} (任务 {}) ===",
                title, record.candidate.original_product_id
            ));
            for url in &record.details.images {
                lines.push(url.clone());
                total += 1;
            }
            lines.push(String::new());
        }
        lines.push(format!("共 {} 条记录, {} 张图片", records.len(), total));

        std::fs::write(&self.images_report_path, lines.join("\n"))
            .map_err(|e| ScrapeError::file(&self.images_report_path, e))?;
        info!("💾 图片清单已写入: {}", self.images_report_path);
        Ok(())
    }

    /// 写全部输出文件
    ///
    /// 空记录集直接跳过，上一次运行的输出文件原样保留
    pub fn write_all(&self, records: &[DetailRecord]) -> Result<()> {
        if records.is_empty() {
            warn!("⚠️ 没有通过验收的记录，跳过落盘以保留已有输出");
            return Ok(());
        }
        self.write_csv(records)?;
        self.write_json(records)?;
        self.write_images_report(records)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        Path::new(&self.csv_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, DetailFields};

    fn make_record(description: &str) -> DetailRecord {
        let candidate = Candidate {
            img: Some("https://img/a.jpg".to_string()),
            description: Some(description.to_string()),
            price: Some("$1.20".to_string()),
            company: Some("Acme, Ltd.".to_string()),
            product_url: Some("https://www.alibaba.com/product-detail/a.html".to_string()),
            min_order: Some("100 pieces".to_string()),
            original_product_id: 42,
            category_id: Some("7".to_string()),
        };
        let mut details = DetailFields::default();
        details
            .attributes
            .insert("Material".to_string(), "Steel".to_string());
        DetailRecord::merge(candidate, details, None)
    }

    #[test]
    fn test_quoting_comma_and_quote() {
        let mut out = Vec::new();
        write_row(
            &mut out,
            &["a,b".to_string(), "say \"hi\"".to_string(), "plain".to_string()],
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"a,b\",\"say \"\"hi\"\"\",plain\n"
        );
    }

    #[test]
    fn test_quoting_newline() {
        let mut out = Vec::new();
        write_row(&mut out, &["line1\nline2".to_string()]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\"line1\nline2\"\n");
    }

    #[test]
    fn test_row_has_every_column() {
        let record = make_record("widget");
        let row = record_to_row(&record).unwrap();
        assert_eq!(row.len(), CSV_FIELDS.len());
        assert_eq!(row[13], "42");
        // 复合字段是 JSON 字符串
        assert!(row[9].contains("\"Material\":\"Steel\""));
    }

    #[test]
    fn test_empty_run_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        std::fs::write(&csv_path, "上一次运行的数据\n").unwrap();

        let writer = ResultWriter {
            csv_path: csv_path.to_string_lossy().into_owned(),
            json_path: dir.path().join("out.json").to_string_lossy().into_owned(),
            images_report_path: dir.path().join("imgs.txt").to_string_lossy().into_owned(),
        };
        writer.write_all(&[]).unwrap();

        // 已有文件不被只含表头的空输出覆盖
        let body = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(body, "上一次运行的数据\n");
        assert!(!dir.path().join("out.json").exists());
        assert!(!dir.path().join("imgs.txt").exists());
    }

    #[test]
    fn test_full_csv_round_trip_shape() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let writer = ResultWriter {
            csv_path: csv_path.to_string_lossy().into_owned(),
            json_path: dir.path().join("out.json").to_string_lossy().into_owned(),
            images_report_path: dir.path().join("imgs.txt").to_string_lossy().into_owned(),
        };
        writer
            .write_all(&[make_record("widget"), make_record("gadget, pro")])
            .unwrap();

        let body = std::fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("img,description,price"));
        assert!(lines[2].contains("\"gadget, pro\""));
    }
}
