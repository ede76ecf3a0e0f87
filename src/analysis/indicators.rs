//! Pure technical indicator computations over a candle window.
//!
//! No I/O, no state. Every function takes the most recent N candles
//! (time-ordered, oldest first) and returns the indicator's current
//! value. When the window is shorter than an indicator's minimum period
//! the function returns its documented neutral default instead of
//! failing, so a full [`IndicatorSet`] can always be produced.

use serde::Serialize;

use crate::models::candle::Candle;

/// Trading days per year, used to annualize return volatility.
const TRADING_DAYS: f64 = 252.0;

/// MACD line, signal line, and histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Where the last close sits relative to the Bollinger bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BandPosition {
    AboveUpper,
    BelowLower,
    WithinBands,
}

/// Bollinger bands with the last close's position flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: BandPosition,
}

/// Aroon up/down and their oscillator (up minus down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aroon {
    pub up: f64,
    pub down: f64,
    pub oscillator: f64,
}

/// Classic pivot points from the prior completed candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
}

/// Fibonacci retracement levels over the last 20 candles' range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibonacciLevels {
    pub high: f64,
    pub low: f64,
    pub fib_236: f64,
    pub fib_382: f64,
    pub fib_500: f64,
    pub fib_618: f64,
    pub fib_786: f64,
}

/// Elder's bull/bear power: high/low distance from EMA(13).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BullBearPower {
    pub bull: f64,
    pub bear: f64,
}

/// Every indicator the decision engine consumes, computed fresh per
/// window and replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub sma_20: f64,
    pub sma_50: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub rsi: f64,
    pub macd: Macd,
    pub bollinger: Bollinger,
    pub stochastic_k: f64,
    pub williams_r: f64,
    pub volume_sma: f64,
    pub volume_ratio: f64,
    pub cci: f64,
    pub roc: f64,
    pub momentum: f64,
    pub atr: f64,
    pub volatility: f64,
    pub adx: f64,
    pub aroon: Aroon,
    pub obv: f64,
    pub mfi: f64,
    pub vwap: f64,
    pub pivot_points: Option<PivotPoints>,
    pub fibonacci: Option<FibonacciLevels>,
    pub fear_greed: f64,
    pub bull_bear: BullBearPower,
}

/// Computes the full indicator set for a window.
///
/// Deterministic: identical windows yield identical output. Indicators
/// whose minimum period exceeds the window length take their neutral
/// defaults rather than failing the computation.
pub fn calculate_indicators(window: &[Candle]) -> IndicatorSet {
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();

    let volume_sma = {
        let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
        sma(&volumes, 20)
    };
    let last_volume = window.last().map(|c| c.volume).unwrap_or(0.0);
    let volume_ratio = if volume_sma > 0.0 {
        last_volume / volume_sma
    } else {
        1.0
    };

    IndicatorSet {
        sma_20: sma(&closes, 20),
        sma_50: sma(&closes, 50),
        ema_12: ema(&closes, 12),
        ema_26: ema(&closes, 26),
        rsi: rsi(&closes, 14),
        macd: macd(&closes, 12, 26, 9),
        bollinger: bollinger(&closes, 20, 2.0),
        stochastic_k: stochastic_k(window, 14),
        williams_r: williams_r(window, 14),
        volume_sma,
        volume_ratio,
        cci: cci(window, 20),
        roc: roc(&closes, 12),
        momentum: momentum(&closes, 10),
        atr: atr(window, 14),
        volatility: volatility(&closes, 20),
        adx: adx(window, 14),
        aroon: aroon(window, 14),
        obv: obv(window),
        mfi: mfi(window, 14),
        vwap: vwap(window),
        pivot_points: pivot_points(window),
        fibonacci: fibonacci_retracements(window),
        fear_greed: fear_greed(window),
        bull_bear: bull_bear_power(window),
    }
}

/// Simple moving average of the last `period` values.
///
/// Falls back to the latest value (the last close, for price series)
/// when the window is too short; 0 for an empty series.
pub fn sma(values: &[f64], period: usize) -> f64 {
    if values.is_empty() || period == 0 {
        return 0.0;
    }
    if values.len() < period {
        return values[values.len() - 1];
    }
    let tail = &values[values.len() - period..];
    tail.iter().sum::<f64>() / period as f64
}

/// Final EMA value, seeded with the SMA of the first `period` values.
///
/// Multiplier `k = 2 / (period + 1)`. Falls back to the latest value
/// when the window is too short; 0 for an empty series.
pub fn ema(values: &[f64], period: usize) -> f64 {
    let series = ema_series(values, period);
    match series.last() {
        Some(&v) => v,
        None => values.last().copied().unwrap_or(0.0),
    }
}

/// EMA series from the seed onward. Empty if `values.len() < period`.
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period || period == 0 {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    for &value in &values[period..] {
        let prev = series[series.len() - 1];
        series.push(value * k + prev * (1.0 - k));
    }
    series
}

/// Relative Strength Index with Wilder's smoothing.
///
/// Initial averages come from the first `period` changes; subsequent
/// changes are blended with factor `1/period`. Neutral default 50.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 || period == 0 {
        return 50.0;
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let n = period as f64;

    let mut avg_gain = changes[..period].iter().filter(|&&c| c > 0.0).sum::<f64>() / n;
    let mut avg_loss = changes[..period]
        .iter()
        .filter(|&&c| c < 0.0)
        .map(|c| -c)
        .sum::<f64>()
        / n;

    for &change in &changes[period..] {
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
    }

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0; // flat window: no gains, no losses
        }
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD(12,26,9): fast EMA minus slow EMA, with an EMA signal line over
/// the MACD series. Neutral default 0/0/0.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let neutral = Macd {
        line: 0.0,
        signal: 0.0,
        histogram: 0.0,
    };
    if closes.len() < slow + signal {
        return neutral;
    }

    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);
    if fast_series.is_empty() || slow_series.is_empty() {
        return neutral;
    }

    // Align the two series at the slow EMA's start.
    let offset = slow - fast;
    let macd_values: Vec<f64> = (0..slow_series.len())
        .map(|i| fast_series[i + offset] - slow_series[i])
        .collect();

    let signal_series = ema_series(&macd_values, signal);
    let Some(&signal_line) = signal_series.last() else {
        return neutral;
    };
    let line = macd_values[macd_values.len() - 1];

    Macd {
        line,
        signal: signal_line,
        histogram: line - signal_line,
    }
}

/// Bollinger bands: SMA(period) ± `std_mult` sample standard deviations.
///
/// Falls back to close ± 2% around the last close when the window is too
/// short.
pub fn bollinger(closes: &[f64], period: usize, std_mult: f64) -> Bollinger {
    let last = closes.last().copied().unwrap_or(0.0);
    if closes.len() < period || period < 2 {
        return Bollinger {
            upper: last * 1.02,
            middle: last,
            lower: last * 0.98,
            position: BandPosition::WithinBands,
        };
    }

    let tail = &closes[closes.len() - period..];
    let middle = tail.iter().sum::<f64>() / period as f64;
    let variance = tail.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / (period as f64 - 1.0);
    let std_dev = variance.sqrt();

    let upper = middle + std_mult * std_dev;
    let lower = middle - std_mult * std_dev;
    let position = if last > upper {
        BandPosition::AboveUpper
    } else if last < lower {
        BandPosition::BelowLower
    } else {
        BandPosition::WithinBands
    };

    Bollinger {
        upper,
        middle,
        lower,
        position,
    }
}

/// Stochastic %K over `period` candles. Neutral default 50.
pub fn stochastic_k(window: &[Candle], period: usize) -> f64 {
    if window.len() < period || period == 0 {
        return 50.0;
    }

    let tail = &window[window.len() - period..];
    let low = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let high = tail.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let close = window[window.len() - 1].close;

    if high == low {
        return 50.0;
    }
    100.0 * (close - low) / (high - low)
}

/// Williams %R over `period` candles, in [-100, 0]. Neutral default -50.
pub fn williams_r(window: &[Candle], period: usize) -> f64 {
    if window.len() < period || period == 0 {
        return -50.0;
    }

    let tail = &window[window.len() - period..];
    let low = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let high = tail.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let close = window[window.len() - 1].close;

    if high == low {
        return -50.0;
    }
    -100.0 * (high - close) / (high - low)
}

/// Commodity Channel Index over `period` typical prices.
///
/// `(tp - sma_tp) / (0.015 * mean_abs_deviation)`. Neutral default 0.
pub fn cci(window: &[Candle], period: usize) -> f64 {
    if window.len() < period || period == 0 {
        return 0.0;
    }

    let tps: Vec<f64> = window[window.len() - period..]
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();
    let mean = tps.iter().sum::<f64>() / period as f64;
    let mad = tps.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;

    if mad == 0.0 {
        return 0.0;
    }
    (tps[tps.len() - 1] - mean) / (0.015 * mad)
}

/// Rate of change: percentage move over `period` candles. Neutral default 0.
pub fn roc(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 {
        return 0.0;
    }
    let base = closes[closes.len() - 1 - period];
    if base == 0.0 {
        return 0.0;
    }
    (closes[closes.len() - 1] - base) / base * 100.0
}

/// Momentum: absolute move over `period` candles. Neutral default 0.
pub fn momentum(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 {
        return 0.0;
    }
    closes[closes.len() - 1] - closes[closes.len() - 1 - period]
}

/// Average True Range: simple mean of the last `period` true ranges.
///
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`. Neutral default 0.
pub fn atr(window: &[Candle], period: usize) -> f64 {
    if window.len() < period + 1 || period == 0 {
        return 0.0;
    }

    let start = window.len() - period;
    let mut sum = 0.0;
    for i in start..window.len() {
        let c = &window[i];
        let prev_close = window[i - 1].close;
        let tr = (c.high - c.low)
            .max((c.high - prev_close).abs())
            .max((c.low - prev_close).abs());
        sum += tr;
    }
    sum / period as f64
}

/// Annualized volatility: sample stdev of the last `period` simple
/// returns, scaled by sqrt(252). Neutral default 0.
pub fn volatility(closes: &[f64], period: usize) -> f64 {
    if closes.len() < period + 1 || period < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = closes[closes.len() - period - 1..]
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() as f64 - 1.0);

    variance.sqrt() * TRADING_DAYS.sqrt()
}

/// Average Directional Index over `period` candles.
///
/// Directional movements are averaged over the period and scaled by the
/// ATR; the ADX is the mean of the trailing DX values. Neutral default 0.
pub fn adx(window: &[Candle], period: usize) -> f64 {
    if window.len() < 2 * period + 1 || period == 0 {
        return 0.0;
    }

    let atr_value = atr(window, period);
    if atr_value == 0.0 {
        return 0.0;
    }

    // Directional movement per candle transition.
    let n = window.len();
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);
    for i in 1..n {
        let high_diff = window[i].high - window[i - 1].high;
        let low_diff = window[i].low - window[i - 1].low;
        plus_dm.push(if high_diff > low_diff && high_diff > 0.0 {
            high_diff
        } else {
            0.0
        });
        minus_dm.push(if low_diff > high_diff && low_diff > 0.0 {
            low_diff
        } else {
            0.0
        });
    }

    // DX over the trailing `period` positions, each from a `period`-mean
    // of the directional movements ending there.
    let mut dx_sum = 0.0;
    let len = plus_dm.len();
    for end in (len - period + 1)..=len {
        let plus_avg = plus_dm[end - period..end].iter().sum::<f64>() / period as f64;
        let minus_avg = minus_dm[end - period..end].iter().sum::<f64>() / period as f64;
        let plus_di = 100.0 * plus_avg / atr_value;
        let minus_di = 100.0 * minus_avg / atr_value;
        let denom = plus_di + minus_di;
        if denom == 0.0 {
            return 0.0;
        }
        dx_sum += 100.0 * (plus_di - minus_di).abs() / denom;
    }

    dx_sum / period as f64
}

/// Aroon up/down over the last `period + 1` candles.
///
/// Measures candles elapsed since the window's highest high and lowest
/// low. Neutral default 50/50/0.
pub fn aroon(window: &[Candle], period: usize) -> Aroon {
    if window.len() < period + 1 || period == 0 {
        return Aroon {
            up: 50.0,
            down: 50.0,
            oscillator: 0.0,
        };
    }

    let tail = &window[window.len() - period - 1..];
    let mut high_idx = 0;
    let mut low_idx = 0;
    for (i, candle) in tail.iter().enumerate() {
        if candle.high > tail[high_idx].high {
            high_idx = i;
        }
        if candle.low < tail[low_idx].low {
            low_idx = i;
        }
    }

    let since_high = (tail.len() - 1 - high_idx) as f64;
    let since_low = (tail.len() - 1 - low_idx) as f64;
    let up = (period as f64 - since_high) / period as f64 * 100.0;
    let down = (period as f64 - since_low) / period as f64 * 100.0;

    Aroon {
        up,
        down,
        oscillator: up - down,
    }
}

/// On-Balance Volume: cumulative signed volume from the first candle.
pub fn obv(window: &[Candle]) -> f64 {
    let mut value = 0.0;
    for pair in window.windows(2) {
        if pair[1].close > pair[0].close {
            value += pair[1].volume;
        } else if pair[1].close < pair[0].close {
            value -= pair[1].volume;
        }
    }
    value
}

/// Money Flow Index over `period` typical-price transitions.
///
/// A zero negative-flow sum is substituted with 1 to avoid division by
/// zero; a window with no flow in either direction reads neutral.
/// Neutral default 50.
pub fn mfi(window: &[Candle], period: usize) -> f64 {
    if window.len() < period + 1 || period == 0 {
        return 50.0;
    }

    let tps: Vec<f64> = window
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();

    let mut positive = 0.0;
    let mut negative = 0.0;
    for i in window.len() - period..window.len() {
        let flow = tps[i] * window[i].volume;
        if tps[i] > tps[i - 1] {
            positive += flow;
        } else if tps[i] < tps[i - 1] {
            negative += flow;
        }
    }

    if negative == 0.0 {
        if positive == 0.0 {
            return 50.0;
        }
        negative = 1.0;
    }
    100.0 - 100.0 / (1.0 + positive / negative)
}

/// Volume-weighted average price over the whole window.
///
/// Falls back to the last close when the window carries no volume.
pub fn vwap(window: &[Candle]) -> f64 {
    let mut pv = 0.0;
    let mut v = 0.0;
    for candle in window {
        let tp = (candle.high + candle.low + candle.close) / 3.0;
        pv += tp * candle.volume;
        v += candle.volume;
    }

    if v == 0.0 {
        return window.last().map(|c| c.close).unwrap_or(0.0);
    }
    pv / v
}

/// Classic pivot points from the prior completed candle.
///
/// `None` with fewer than 2 candles.
pub fn pivot_points(window: &[Candle]) -> Option<PivotPoints> {
    if window.len() < 2 {
        return None;
    }

    let prev = &window[window.len() - 2];
    let pivot = (prev.high + prev.low + prev.close) / 3.0;
    Some(PivotPoints {
        pivot,
        r1: 2.0 * pivot - prev.low,
        s1: 2.0 * pivot - prev.high,
        r2: pivot + (prev.high - prev.low),
        s2: pivot - (prev.high - prev.low),
    })
}

/// Fibonacci retracement levels over the last 20 candles' high/low range.
///
/// `None` with fewer than 20 candles.
pub fn fibonacci_retracements(window: &[Candle]) -> Option<FibonacciLevels> {
    if window.len() < 20 {
        return None;
    }

    let tail = &window[window.len() - 20..];
    let high = tail.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let diff = high - low;

    Some(FibonacciLevels {
        high,
        low,
        fib_236: high - 0.236 * diff,
        fib_382: high - 0.382 * diff,
        fib_500: high - 0.5 * diff,
        fib_618: high - 0.618 * diff,
        fib_786: high - 0.786 * diff,
    })
}

/// Composite fear/greed score in [0, 100].
///
/// Equal-weighted blend of 10-period momentum, 10-period return
/// volatility, the 20-period volume ratio, and RSI(14), each clamped to
/// [0, 100]. Neutral default 50 with fewer than 20 candles.
pub fn fear_greed(window: &[Candle]) -> f64 {
    if window.len() < 20 {
        return 50.0;
    }

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let n = closes.len();

    let base = closes[n - 10];
    let price_change = if base != 0.0 {
        (closes[n - 1] - base) / base
    } else {
        0.0
    };
    let momentum_score = (price_change * 100.0 + 50.0).clamp(0.0, 100.0);

    let returns: Vec<f64> = closes[n - 11..]
        .windows(2)
        .map(|w| if w[0] != 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() as f64 - 1.0);
    let volatility_score = (100.0 - variance.sqrt() * 1000.0).clamp(0.0, 100.0);

    let volumes: Vec<f64> = window[window.len() - 20..].iter().map(|c| c.volume).collect();
    let avg_volume = volumes.iter().sum::<f64>() / volumes.len() as f64;
    let volume_ratio = if avg_volume > 0.0 {
        window[window.len() - 1].volume / avg_volume
    } else {
        1.0
    };
    let volume_score = (volume_ratio * 50.0).clamp(0.0, 100.0);

    let rsi_score = rsi(&closes, 14);

    (momentum_score + volatility_score + volume_score + rsi_score) / 4.0
}

/// Bull/bear power: latest high and low minus EMA(13) of closes.
///
/// Neutral default 0/0 with fewer than 13 candles.
pub fn bull_bear_power(window: &[Candle]) -> BullBearPower {
    if window.len() < 13 {
        return BullBearPower {
            bull: 0.0,
            bear: 0.0,
        };
    }

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let ema_13 = ema(&closes, 13);
    let last = &window[window.len() - 1];

    BullBearPower {
        bull: last.high - ema_13,
        bear: last.low - ema_13,
    }
}
