use chrono::{Datelike, NaiveDate};
use itertools::Itertools;
use schema::{Catalog, RevenueReport, RevenueRow};

use crate::{MemoryStore, ServerError};

fn parse_month(month: &str) -> Result<(i32, u32), ServerError> {
    NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .map(|date| (date.year(), date.month()))
        .map_err(|_| ServerError::InvalidMonth(month.to_string()))
}

/// Ticket revenue per airline.
///
/// Without a filter every airline is listed along with all of its flights. The filter only
/// applies when both an airline keyword and a `YYYY-MM` month are given, in which case only
/// airlines that sold matching tickets that month are listed.
pub fn statistic_revenue_follow_month(
    store: &MemoryStore,
    airline_name: Option<&str>,
    month: Option<&str>,
) -> Result<RevenueReport, ServerError> {
    let airline_name = airline_name.map(str::trim).filter(|name| !name.is_empty());
    let month = month.map(str::trim).filter(|month| !month.is_empty());
    let filter = match (airline_name, month) {
        (Some(name), Some(month)) => Some((name.to_lowercase(), parse_month(month)?)),
        _ => None,
    };

    let tickets = store
        .tickets()
        .filter(|ticket| match &filter {
            Some((_, (year, month))) => {
                ticket.date.year() == *year && ticket.date.month() == *month
            }
            None => true,
        })
        .filter_map(|ticket| {
            let flight = store.flight(&ticket.flight)?;
            Some((flight.airline.clone(), ticket))
        })
        .into_group_map();
    let flights = store
        .flights()
        .map(|flight| (flight.airline.clone(), flight.id.clone()))
        .into_group_map();

    let rows = store
        .airlines()
        .filter_map(|airline| {
            let sold = tickets.get(&airline.id);
            let revenue = sold.map(|sold| sold.iter().map(|ticket| ticket.price).sum::<i64>());

            let flight_count = match &filter {
                None => flights.get(&airline.id).map_or(0, Vec::len),
                Some((keyword, _)) => {
                    if !airline.name.to_lowercase().contains(keyword) {
                        return None;
                    }
                    sold?.iter().map(|ticket| &ticket.flight).unique().count()
                }
            };

            Some(RevenueRow {
                airline: airline.id.clone(),
                airline_name: airline.name.clone(),
                revenue,
                flight_count: flight_count as u32,
            })
        })
        .collect();

    Ok(RevenueReport::new(rows))
}
