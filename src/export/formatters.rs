//! Export output formats.

use crate::duration::format_duration;

use super::{ExportData, ExportFormat};

pub trait Formatter: Send + Sync {
    fn format(&self, data: &ExportData) -> anyhow::Result<String>;
    fn content_type(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;
}

pub fn formatter_for(format: ExportFormat) -> Box<dyn Formatter> {
    match format {
        ExportFormat::Json => Box::new(JsonFormatter),
        ExportFormat::Csv => Box::new(CsvFormatter),
        ExportFormat::Html => Box::new(HtmlFormatter),
    }
}

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, data: &ExportData) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        ".json"
    }
}

pub struct CsvFormatter;

impl CsvFormatter {
    fn escape(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl Formatter for CsvFormatter {
    fn format(&self, data: &ExportData) -> anyhow::Result<String> {
        let mut out = String::from(
            "timestamp,site_name,url,success,status_code,response_time_ms,error\n",
        );
        for entry in &data.history {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                entry.timestamp.to_rfc3339(),
                Self::escape(&entry.site_name),
                Self::escape(&entry.url),
                entry.success,
                entry.status,
                entry.duration.as_millis(),
                Self::escape(&entry.error),
            ));
        }
        Ok(out)
    }

    fn content_type(&self) -> &'static str {
        "text/csv"
    }

    fn file_extension(&self) -> &'static str {
        ".csv"
    }
}

pub struct HtmlFormatter;

impl HtmlFormatter {
    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}

impl Formatter for HtmlFormatter {
    fn format(&self, data: &ExportData) -> anyhow::Result<String> {
        let mut rows = String::new();
        for entry in &data.history {
            let (class, icon) = if entry.success {
                ("ok", "&#10003;")
            } else {
                ("fail", "&#10007;")
            };
            rows.push_str(&format!(
                "<tr class=\"{class}\"><td>{}</td><td>{}</td><td>{icon}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                Self::escape(&entry.site_name),
                entry.status,
                format_duration(entry.duration),
                Self::escape(&entry.error),
            ));
        }

        let stats_block = match &data.stats {
            Some(stats) => format!(
                "<p>{} checks across {} sites, {:.1}% overall uptime, avg response {}</p>",
                stats.total_checks,
                stats.total_sites,
                stats.overall_uptime_percent,
                format_duration(stats.avg_response_time),
            ),
            None => String::new(),
        };

        Ok(format!(
            r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>sitewatch export</title>
<style>
body {{ font-family: sans-serif; margin: 2em; color: #222; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ddd; padding: 6px 10px; text-align: left; }}
tr.fail td {{ background: #fdecea; }}
</style></head>
<body>
<h1>Monitoring export</h1>
<p>Generated {generated} covering {from} to {to} ({records} records)</p>
{stats_block}
<table>
<tr><th>Timestamp</th><th>Site</th><th>Status</th><th>Code</th><th>Response Time</th><th>Error</th></tr>
{rows}</table>
</body></html>
"#,
            generated = data.metadata.generated_at.format("%Y-%m-%d %H:%M:%S"),
            from = data.metadata.from.format("%Y-%m-%d %H:%M"),
            to = data.metadata.to.format("%Y-%m-%d %H:%M"),
            records = data.metadata.total_records,
        ))
    }

    fn content_type(&self) -> &'static str {
        "text/html"
    }

    fn file_extension(&self) -> &'static str {
        ".html"
    }
}
