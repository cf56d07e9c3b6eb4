use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One page of a filtered listing. `total` counts matches before pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl Page {
    pub fn total_pages(total: u64, page_size: u64) -> u64 {
        total.div_ceil(page_size)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_desc: bool,
}

fn default_namespace() -> String {
    "all".to_string()
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            search: String::new(),
            page: default_page(),
            page_size: default_page_size(),
            sort_by: None,
            sort_desc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceView {
    pub name: String,
    pub created: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorPod {
    pub namespace: String,
    pub name: String,
    pub node: String,
    pub phase: String,
    pub quantity: String,
    pub created: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Accelerator,
    Cpu,
    Memory,
}

impl MetricType {
    pub const ALL: [MetricType; 3] = [MetricType::Accelerator, MetricType::Cpu, MetricType::Memory];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Accelerator => "accelerator",
            MetricType::Cpu => "cpu",
            MetricType::Memory => "memory",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric type {:?}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamespaceMetricView {
    pub namespace: String,
    pub used: f64,
    pub total: f64,
    /// `used / total * 100`, or 0 when no capacity is known.
    pub percentage: f64,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Page::total_pages(0, 10), 0);
        assert_eq!(Page::total_pages(10, 10), 1);
        assert_eq!(Page::total_pages(11, 10), 2);
        assert_eq!(Page::total_pages(1, 50), 1);
    }

    #[test]
    fn metric_type_parse() {
        assert_eq!("GPU".parse::<MetricType>().ok(), None);
        assert_eq!("Accelerator".parse::<MetricType>().unwrap(), MetricType::Accelerator);
        assert_eq!(MetricType::Memory.to_string(), "memory");
    }
}
