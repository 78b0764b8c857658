use super::formatter::format_date;
use super::stats::{HeatMapCell, MoodStat, TagStat};
use crate::db::migrations::MigrationRecord;
use anyhow::Result;
use prettytable::{row, Table};

pub struct View {}

impl View {
    pub fn heat_map(cells: &[HeatMapCell]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["DATE", "MOOD", "SCORE", "COLOR", "COUNT"]);
        for cell in cells {
            let mood = cell.mood_key.as_deref().unwrap_or("-");
            let score = cell.mood_score.map(|score| score.to_string()).unwrap_or_else(|| "-".to_string());
            table.add_row(row![format_date(cell.date), mood, score, cell.color, cell.count]);
        }
        table.printstd();

        Ok(())
    }

    pub fn tags(tags: &[TagStat]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["TAG", "COUNT"]);
        for tag in tags {
            table.add_row(row![tag.tag, tag.count]);
        }
        table.printstd();

        Ok(())
    }

    pub fn moods(moods: &[MoodStat]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["MOOD", "COUNT", "PERCENT", "COLOR"]);
        for mood in moods {
            let percent = format!("{:.1}%", mood.percentage);
            table.add_row(row![mood.mood_key, mood.count, percent, mood.color]);
        }
        table.printstd();

        Ok(())
    }

    pub fn migrations(history: &[MigrationRecord]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["VERSION", "NAME", "APPLIED AT"]);
        for record in history {
            let version = format!("v{}", record.version);
            let applied_at = record.applied_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
            table.add_row(row![version, record.name, applied_at]);
        }
        table.printstd();

        Ok(())
    }
}
