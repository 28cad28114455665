// Decision engine: lagging technical signals and the per-symbol trade decision

use crate::config::TradingConfig;
use crate::core::types::{Bar, TradeSignal};
use crate::error::{TradingError, TradingResult};

/// Trailing simple moving average, one value per input element.
///
/// The leading edge uses partial-window means so the output always has the
/// same length as the input.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut averages = Vec::with_capacity(values.len());
    let mut running_sum = 0.0;

    for i in 0..values.len() {
        running_sum += values[i];
        if i >= window {
            running_sum -= values[i - window];
        }
        let span = (i + 1).min(window);
        averages.push(running_sum / span as f64);
    }

    averages
}

/// Per-bar crossover signal: +1 where the fast column exceeds the slow
/// column, -1 where it is below, 0 where equal.
pub fn crossover_signal(fast: &[f64], slow: &[f64]) -> Vec<i8> {
    fast.iter()
        .zip(slow.iter())
        .map(|(f, s)| {
            if f > s {
                1
            } else if f < s {
                -1
            } else {
                0
            }
        })
        .collect()
}

/// Latest Average True Range over a trailing window.
///
/// True range per bar is max(high-low, |high-prev_close|, |low-prev_close|);
/// the result is the mean of the last `period` true ranges. Bars without a
/// previous close contribute nothing, so at least `period + 1` bars are
/// required.
pub fn average_true_range(bars: &[Bar], period: usize) -> TradingResult<f64> {
    let mut true_ranges = Vec::new();
    for pair in bars.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        let high_low = bar.high - bar.low;
        let high_close = (bar.high - prev_close).abs();
        let low_close = (bar.low - prev_close).abs();
        true_ranges.push(high_low.max(high_close).max(low_close));
    }

    if true_ranges.len() < period {
        return Err(TradingError::InsufficientData(format!(
            "ATR needs {} bars with a previous close, got {}",
            period,
            true_ranges.len()
        )));
    }

    let tail = &true_ranges[true_ranges.len() - period..];
    Ok(tail.iter().sum::<f64>() / period as f64)
}

/// Price below which an open lot is unconditionally exited.
pub fn stop_loss_price(entry_price: f64, risk_threshold: f64) -> f64 {
    entry_price * (1.0 - risk_threshold)
}

/// Coarse two-factor confirmation for a buy.
///
/// Vote one is the sign of the cumulative return from applying the crossover
/// signal to per-bar percentage price changes; vote two is whether the latest
/// ATR sits inside the configured volatility band. The gate passes when the
/// vote sum is strictly positive. This is a sanity filter, not a backtest: a
/// production setup should demand several independent confirmations before
/// committing capital.
pub fn backtest_gate(bars: &[Bar], config: &TradingConfig) -> TradingResult<bool> {
    let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();

    let fast = moving_average(&closes, config.fast_ma_window);
    let slow = moving_average(&closes, config.slow_ma_window);
    let signals = crossover_signal(&fast, &slow);

    let mut strategy_return = 0.0;
    for i in 1..closes.len() {
        if closes[i - 1] != 0.0 {
            let pct_change = closes[i] / closes[i - 1] - 1.0;
            strategy_return += pct_change * signals[i] as f64;
        }
    }
    let return_vote: i32 = if strategy_return > 0.0 { 1 } else { -1 };

    let atr = average_true_range(bars, config.atr_period)?;
    let volatility_vote: i32 = if atr >= config.atr_low && atr <= config.atr_high {
        1
    } else {
        -1
    };

    Ok(return_vote + volatility_vote > 0)
}

/// Trade decision for one symbol.
///
/// The stop-loss exit on the newest open lot is evaluated before any buy
/// consideration, so a simultaneous stop-loss and buy condition resolves to
/// Sell. A buy additionally requires the open-lot count to be under the
/// per-symbol cap.
pub fn decide(
    market_price: f64,
    last_buy_price: Option<f64>,
    open_lots: usize,
    gate_passed: bool,
    config: &TradingConfig,
) -> TradeSignal {
    if let Some(entry_price) = last_buy_price {
        if open_lots > 0 && market_price < stop_loss_price(entry_price, config.risk_threshold) {
            return TradeSignal::Sell;
        }
    }

    if gate_passed && open_lots < config.max_open_lots {
        return TradeSignal::Buy;
    }

    TradeSignal::Hold
}
