//! ==============================================================================
//! view.rs - render targets owned by one poll view
//! ==============================================================================
//!
//! every target is optional. a dashboard without a chart or without metric
//! cells still renders the parts it has; the renderer matches on each slot.
//!
//! the canvas holds at most one live chart. drawing destroys the previous
//! instance before creating the next one, so series lengths never go stale.
//!
//! ==============================================================================

use serde::Serialize;
use tracing::debug;

/// one table row, five display cells
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableRow {
    pub time: String,
    pub temperature: String,
    pub co2: String,
    pub presence: String,
    pub risk: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TableBody {
    pub rows: Vec<TableRow>,
}

impl TableBody {
    pub fn replace(&mut self, rows: Vec<TableRow>) {
        self.rows = rows;
    }
}

/// a single text container (a summary metric)
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextCell {
    pub text: String,
}

impl TextCell {
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

/// parallel arrays handed to the chart, oldest first
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub temperature: Vec<Option<f64>>,
    pub co2: Vec<Option<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    pub label: &'static str,
    pub data: Vec<Option<f64>>,
}

/// a live line chart instance
#[derive(Clone, Debug, Serialize)]
pub struct LineChart {
    pub id: u64,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl LineChart {
    fn new(id: u64, data: ChartData) -> Self {
        Self {
            id,
            labels: data.labels,
            datasets: vec![
                Dataset { label: "°C", data: data.temperature },
                Dataset { label: "CO₂", data: data.co2 },
            ],
        }
    }

    fn destroy(self) {
        debug!(chart = self.id, points = self.labels.len(), "destroying chart");
    }
}

/// chart surface; owns the single chart instance
#[derive(Debug, Default, Serialize)]
pub struct Canvas {
    chart: Option<LineChart>,
    created: u64,
    destroyed: u64,
}

impl Canvas {
    /// replace the live chart with a fresh one built from `data`
    pub fn draw(&mut self, data: ChartData) -> &LineChart {
        if let Some(old) = self.chart.take() {
            old.destroy();
            self.destroyed += 1;
        }
        self.created += 1;
        self.chart.insert(LineChart::new(self.created, data))
    }

    pub fn chart(&self) -> Option<&LineChart> {
        self.chart.as_ref()
    }

    /// 0 or 1
    pub fn live_instances(&self) -> u64 {
        self.created - self.destroyed
    }

    pub fn created(&self) -> u64 {
        self.created
    }
}

/// the four summary metric containers
#[derive(Debug, Default, Serialize)]
pub struct Metrics {
    pub count: Option<TextCell>,
    pub temperature: Option<TextCell>,
    pub co2: Option<TextCell>,
    pub presence: Option<TextCell>,
}

impl Metrics {
    pub fn all() -> Self {
        Self {
            count: Some(TextCell::default()),
            temperature: Some(TextCell::default()),
            co2: Some(TextCell::default()),
            presence: Some(TextCell::default()),
        }
    }
}

/// everything a render can touch
#[derive(Debug, Default, Serialize)]
pub struct View {
    pub table: Option<TableBody>,
    pub metrics: Metrics,
    pub canvas: Option<Canvas>,
}

impl View {
    /// a view with every target attached
    pub fn full() -> Self {
        Self {
            table: Some(TableBody::default()),
            metrics: Metrics::all(),
            canvas: Some(Canvas::default()),
        }
    }

    pub fn from_targets(targets: &crate::config::TargetsConfig) -> Self {
        Self {
            table: targets.table.then(TableBody::default),
            metrics: if targets.metrics { Metrics::all() } else { Metrics::default() },
            canvas: targets.chart.then(Canvas::default),
        }
    }

    pub fn rows(&self) -> &[TableRow] {
        self.table.as_ref().map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    pub fn chart(&self) -> Option<&LineChart> {
        self.canvas.as_ref().and_then(Canvas::chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> ChartData {
        ChartData {
            labels: (0..n).map(|i| i.to_string()).collect(),
            temperature: vec![Some(20.0); n],
            co2: vec![None; n],
        }
    }

    #[test]
    fn canvas_keeps_one_live_chart() {
        let mut canvas = Canvas::default();
        assert_eq!(canvas.live_instances(), 0);

        canvas.draw(data(3));
        canvas.draw(data(1));
        canvas.draw(data(2));

        assert_eq!(canvas.live_instances(), 1);
        assert_eq!(canvas.created(), 3);
        let chart = canvas.chart().unwrap();
        assert_eq!(chart.id, 3);
        assert_eq!(chart.labels.len(), 2);
        assert!(chart.datasets.iter().all(|d| d.data.len() == 2));
    }

    #[test]
    fn targets_config_drops_slots() {
        let targets = crate::config::TargetsConfig { table: false, metrics: true, chart: false };
        let view = View::from_targets(&targets);
        assert!(view.table.is_none());
        assert!(view.canvas.is_none());
        assert!(view.metrics.count.is_some());
        assert!(view.rows().is_empty());
    }
}
