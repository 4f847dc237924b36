//! Route records and the lookup indices used to link stop times to routes.

use std::collections::{BTreeSet, HashMap};

use crate::table::RawTable;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub route_id: String,
    pub route_name: String,
    pub stop_list: Vec<String>,
    pub trip_list: Vec<String>,
}

impl RouteRecord {
    /// Builds records from `routes.csv`. The id falls back to the route name.
    pub fn from_table(routes: &RawTable) -> Vec<Self> {
        routes
            .rows
            .iter()
            .map(|row| {
                let route_name = routes.text(row, "name").unwrap_or_default().to_string();
                let route_id = routes
                    .text(row, "id")
                    .map(str::to_string)
                    .unwrap_or_else(|| route_name.clone());
                RouteRecord {
                    route_id,
                    route_name,
                    stop_list: trimmed(routes.list(row, "stop_list")),
                    trip_list: trimmed(routes.list(row, "trip_list")),
                }
            })
            .collect()
    }
}

fn trimmed(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.trim().to_string()).collect()
}

/// time → routes and stop → routes, both as indices into the record list.
#[derive(Debug)]
pub struct RouteIndex<'a> {
    records: &'a [RouteRecord],
    by_time: HashMap<&'a str, Vec<usize>>,
    by_stop: HashMap<&'a str, BTreeSet<usize>>,
}

impl<'a> RouteIndex<'a> {
    #[tracing::instrument(skip_all, fields(routes = records.len()))]
    pub fn build(records: &'a [RouteRecord]) -> Self {
        let mut by_time: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_stop: HashMap<&str, BTreeSet<usize>> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            for t in &record.trip_list {
                by_time.entry(t.as_str()).or_default().push(idx);
            }
            for s in &record.stop_list {
                by_stop.entry(s.as_str()).or_default().insert(idx);
            }
        }

        tracing::debug!(
            distinct_times = by_time.len(),
            distinct_stops = by_stop.len(),
            "Route index built"
        );

        Self {
            records,
            by_time,
            by_stop,
        }
    }

    /// Best-guess route for a stop visited at `time`.
    ///
    /// Prefers a route listing both the time and the stop, then any route
    /// serving the stop (lowest index first).
    pub fn assign(&self, stop_name: &str, time: &str) -> Option<&'a RouteRecord> {
        let by_time = self.by_time.get(time).into_iter().flatten().find(|&&idx| {
            self.records[idx]
                .stop_list
                .iter()
                .any(|s| s == stop_name)
        });

        let idx = by_time.or_else(|| self.by_stop.get(stop_name).and_then(|set| set.first()))?;
        let records = self.records;
        Some(&records[*idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn record(id: &str, stops: &[&str], trips: &[&str]) -> RouteRecord {
        RouteRecord {
            route_id: id.to_string(),
            route_name: format!("Route {id}"),
            stop_list: stops.iter().map(|s| s.to_string()).collect(),
            trip_list: trips.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_from_table_falls_back_to_name() {
        let mut table = RawTable::new(
            vec!["id".into(), "name".into(), "stop_list".into()],
            vec![
                vec![
                    Cell::Text("".into()),
                    Cell::Text("Blue".into()),
                    Cell::Text("[' A ', 'B']".into()),
                ],
                vec![
                    Cell::Text(" 12 ".into()),
                    Cell::Text("Red".into()),
                    Cell::Text("".into()),
                ],
            ],
        );
        table.parse_list_column("stop_list");

        let records = RouteRecord::from_table(&table);
        assert_eq!(records[0].route_id, "Blue");
        assert_eq!(records[0].stop_list, vec!["A", "B"]);
        assert!(records[0].trip_list.is_empty());
        assert_eq!(records[1].route_id, "12");
        assert_eq!(records[1].route_name, "Red");
    }

    #[test]
    fn test_assign_prefers_time_and_stop_match() {
        let records = vec![
            record("R1", &["A", "B"], &["08:00:00"]),
            record("R2", &["C"], &["08:00:00"]),
            record("R3", &["C", "D"], &["09:00:00"]),
        ];
        let index = RouteIndex::build(&records);

        assert_eq!(index.assign("C", "08:00:00").unwrap().route_id, "R2");
        assert_eq!(index.assign("A", "08:00:00").unwrap().route_id, "R1");
    }

    #[test]
    fn test_assign_falls_back_to_stop() {
        let records = vec![
            record("R1", &["A"], &["07:00:00"]),
            record("R2", &["D"], &["08:00:00"]),
            record("R3", &["D"], &[]),
        ];
        let index = RouteIndex::build(&records);

        // time known but no route at that time serves D
        assert_eq!(index.assign("D", "07:00:00").unwrap().route_id, "R2");
        // time unknown
        assert_eq!(index.assign("D", "23:59:00").unwrap().route_id, "R2");
        assert!(index.assign("Z", "07:00:00").is_none());
    }
}
