//! Per-namespace utilization rows derived from cached pod summaries.

use rusqlite::params;
use tracing::debug;

use super::{ResourceStore, namespaces_in, now_rfc3339};
use crate::error::StoreResult;
use crate::helpers::parse_quantity;
use crate::models::resource::ResourceKind;
use crate::models::views::{MetricType, NamespaceMetricView};

impl ResourceStore {
    /// Rebuilds the whole metrics table in one transaction.
    ///
    /// Every known namespace gets a row for every [`MetricType`]. Only accelerator
    /// usage is derived today; cpu and memory rows are zero so the set of metric
    /// types a reader sees never changes. `total` is always zero since no
    /// per-namespace capacity source exists.
    pub fn recompute_namespace_metrics(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let now = now_rfc3339();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM namespace_metrics", [])?;

            let namespaces = namespaces_in(&tx)?;
            {
                let mut quantities = tx.prepare_cached(
                    "SELECT json_extract(projection, '$.accelerators') FROM resources
                     WHERE resource_type = ?1 AND namespace = ?2",
                )?;
                let mut insert = tx.prepare_cached(
                    "INSERT INTO namespace_metrics (namespace, metric_type, used, total, updated_at)
                     VALUES (?1, ?2, ?3, 0, ?4)",
                )?;

                for ns in &namespaces {
                    let accelerators: f64 = quantities
                        .query_map(params![ResourceKind::Pods.as_str(), ns.name], |row| {
                            row.get::<_, Option<String>>(0)
                        })?
                        .map(|q| q.map(|q| q.as_deref().map(parse_quantity).unwrap_or(0.0)))
                        .sum::<Result<f64, _>>()?;

                    for metric in MetricType::ALL {
                        let used = match metric {
                            MetricType::Accelerator => accelerators,
                            MetricType::Cpu | MetricType::Memory => 0.0,
                        };
                        insert.execute(params![ns.name, metric.as_str(), used, now])?;
                    }
                }
            }
            tx.commit()?;

            debug!(namespaces = namespaces.len(), "recomputed namespace metrics");
            Ok(namespaces.len())
        })
    }

    /// Rows for one metric type, heaviest users first.
    pub fn list_namespace_metrics(&self, metric: MetricType) -> StoreResult<Vec<NamespaceMetricView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT namespace, used, total, updated_at FROM namespace_metrics
                 WHERE metric_type = ?1
                 ORDER BY used DESC, namespace ASC",
            )?;
            let rows = stmt
                .query_map(params![metric.as_str()], |row| {
                    let used: f64 = row.get(1)?;
                    let total: f64 = row.get(2)?;
                    Ok(NamespaceMetricView {
                        namespace: row.get(0)?,
                        used,
                        total,
                        percentage: if total > 0.0 { used / total * 100.0 } else { 0.0 },
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::pod;

    #[test]
    fn accelerator_usage_is_summed_per_namespace() {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(
                ResourceKind::Pods,
                &[
                    pod("a", "p1", Some("1")),
                    pod("a", "p2", Some("2")),
                    pod("b", "p3", None),
                ],
            )
            .unwrap();

        assert_eq!(store.recompute_namespace_metrics().unwrap(), 2);
        let rows = store.list_namespace_metrics(MetricType::Accelerator).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].namespace, "a");
        assert_eq!(rows[0].used, 3.0);
        assert_eq!(rows[0].percentage, 0.0);
        assert_eq!(rows[1].namespace, "b");
        assert_eq!(rows[1].used, 0.0);
    }

    #[test]
    fn every_metric_type_gets_a_row() {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(ResourceKind::Pods, &[pod("a", "p1", Some("1"))])
            .unwrap();
        store.recompute_namespace_metrics().unwrap();

        for metric in MetricType::ALL {
            let rows = store.list_namespace_metrics(metric).unwrap();
            assert_eq!(rows.len(), 1, "{metric}");
            assert_eq!(rows[0].total, 0.0);
        }
        let cpu = store.list_namespace_metrics(MetricType::Cpu).unwrap();
        assert_eq!(cpu[0].used, 0.0);
    }

    #[test]
    fn unparseable_quantities_count_as_zero() {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(
                ResourceKind::Pods,
                &[pod("a", "p1", Some("two")), pod("a", "p2", Some("5"))],
            )
            .unwrap();
        store.recompute_namespace_metrics().unwrap();
        let rows = store.list_namespace_metrics(MetricType::Accelerator).unwrap();
        assert_eq!(rows[0].used, 5.0);
    }

    #[test]
    fn recompute_discards_vanished_namespaces() {
        let store = ResourceStore::open_in_memory().unwrap();
        store
            .replace(ResourceKind::Pods, &[pod("old", "p1", Some("1"))])
            .unwrap();
        store.recompute_namespace_metrics().unwrap();

        store
            .replace(ResourceKind::Pods, &[pod("new", "p2", Some("1"))])
            .unwrap();
        store.recompute_namespace_metrics().unwrap();

        let rows = store.list_namespace_metrics(MetricType::Accelerator).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].namespace, "new");
    }
}
