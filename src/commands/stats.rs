use crate::{
    libs::{
        formatter::{format_date, parse_date},
        logger::{is_debug_mode, Logger},
        messages::Message,
        stats::{HeatMapQuery, StatsService},
        state::StateStore,
        view::View,
    },
    msg_bail_anyhow, msg_print,
};
use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

const DEFAULT_TAG_LIMIT: usize = 10;

#[derive(Debug, Args)]
pub struct HeatMapArgs {
    /// First day, YYYY-MM-DD
    #[arg(long, value_parser = date_arg)]
    from: NaiveDate,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long, value_parser = date_arg)]
    to: NaiveDate,
}

#[derive(Debug, Args)]
pub struct TagsArgs {
    /// First day of memo creation, YYYY-MM-DD
    #[arg(long, requires = "to", value_parser = date_arg)]
    from: Option<NaiveDate>,
    /// Last day of memo creation (inclusive), YYYY-MM-DD
    #[arg(long, requires = "from", value_parser = date_arg)]
    to: Option<NaiveDate>,
    /// Maximum number of tags shown for a date range
    #[arg(short, long, default_value_t = DEFAULT_TAG_LIMIT)]
    limit: usize,
}

#[derive(Debug, Args)]
pub struct MoodsArgs {
    /// First day, YYYY-MM-DD
    #[arg(long, value_parser = date_arg)]
    from: NaiveDate,
    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long, value_parser = date_arg)]
    to: NaiveDate,
}

fn date_arg(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(value).map_err(|_| Message::InvalidDate(value.to_string()).to_string())
}

fn service(store: &StateStore) -> StatsService {
    StatsService::new(store.executor(), Logger::stdout(is_debug_mode()))
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        msg_bail_anyhow!(Message::EmptyDateRange(format_date(from), format_date(to)));
    }
    Ok(())
}

pub async fn heat_map(args: HeatMapArgs) -> Result<()> {
    check_range(args.from, args.to)?;
    let store = super::ready_store().await?;

    let cells = service(&store).get_heat_map_data(HeatMapQuery::new(args.from, args.to)).await?;

    msg_print!(Message::HeatMapHeader(format_date(args.from), format_date(args.to)), true);
    View::heat_map(&cells)?;
    Ok(())
}

pub async fn tags(args: TagsArgs) -> Result<()> {
    let store = super::ready_store().await?;
    let stats = service(&store);

    let tags = match (args.from, args.to) {
        (Some(from), Some(to)) => {
            check_range(from, to)?;
            stats.get_top_tags(from, to, args.limit).await?
        }
        _ => stats.get_all_tags().await?,
    };

    msg_print!(Message::TagsHeader, true);
    if tags.is_empty() {
        msg_print!(Message::NoStatsForRange);
    } else {
        View::tags(&tags)?;
    }
    Ok(())
}

pub async fn moods(args: MoodsArgs) -> Result<()> {
    check_range(args.from, args.to)?;
    let store = super::ready_store().await?;

    let moods = service(&store).get_mood_distribution(args.from, args.to).await?;

    msg_print!(Message::MoodsHeader(format_date(args.from), format_date(args.to)), true);
    if moods.is_empty() {
        msg_print!(Message::NoStatsForRange);
    } else {
        View::moods(&moods)?;
    }
    Ok(())
}
