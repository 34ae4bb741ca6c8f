//! Per-strategy performance bookkeeping.

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// Snapshot of a strategy's performance counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyMetrics {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_pnl: Decimal,
    /// Sample mean over sample standard deviation of the per-trade PnL
    /// series. No annualization, no risk-free rate.
    pub sharpe_ratio: f64,
    /// Largest decline from the running peak of cumulative PnL.
    pub max_drawdown: Decimal,
}

#[derive(Default)]
struct MetricsState {
    total_trades: u64,
    winning_trades: u64,
    losing_trades: u64,
    total_pnl: Decimal,
    pnl_series: Vec<f64>,
    peak_pnl: Decimal,
    max_drawdown: Decimal,
}

/// Thread-safe recorder shared by all strategies through their core.
#[derive(Default)]
pub struct MetricsRecorder {
    state: Mutex<MetricsState>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one executed trade.
    pub fn record_trade(&self) {
        self.state.lock().total_trades += 1;
    }

    /// Record the realized PnL of one closed trade and refresh the derived
    /// statistics.
    pub fn record_pnl(&self, pnl: Decimal) {
        let mut state = self.state.lock();
        if pnl > Decimal::ZERO {
            state.winning_trades += 1;
        } else if pnl < Decimal::ZERO {
            state.losing_trades += 1;
        }
        state.total_pnl += pnl;
        state.pnl_series.push(pnl.to_f64().unwrap_or(0.0));

        if state.total_pnl > state.peak_pnl {
            state.peak_pnl = state.total_pnl;
        }
        let drawdown = state.peak_pnl - state.total_pnl;
        if drawdown > state.max_drawdown {
            state.max_drawdown = drawdown;
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StrategyMetrics {
        let state = self.state.lock();
        StrategyMetrics {
            total_trades: state.total_trades,
            winning_trades: state.winning_trades,
            losing_trades: state.losing_trades,
            total_pnl: state.total_pnl,
            sharpe_ratio: sharpe(&state.pnl_series),
            max_drawdown: state.max_drawdown,
        }
    }
}

fn sharpe(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        0.0
    } else {
        mean / std_dev
    }
}
