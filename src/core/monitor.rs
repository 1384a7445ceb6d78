use chrono::{DateTime, Utc};

use crate::models::{Closure, Direction, Signal, SignalStatus};

/// Signed percent move from entry to exit: positive when the exit is
/// favorable for the signal's direction.
pub fn pnl_percent(direction: Direction, entry: f64, exit: f64) -> f64 {
    match direction {
        Direction::Long => (exit - entry) / entry * 100.0,
        Direction::Short => (entry - exit) / entry * 100.0,
    }
}

/// Resolve an active signal against the latest traded price.
///
/// The stop check runs first: if a price satisfies both conditions at
/// once, the adverse outcome wins. Returns `None` while the price sits
/// between stop and target.
pub fn evaluate(signal: &Signal, price: f64, now: DateTime<Utc>) -> Option<Closure> {
    let hit_stop = match signal.direction {
        Direction::Short => price >= signal.stop_loss,
        Direction::Long => price <= signal.stop_loss,
    };
    let hit_target = match signal.direction {
        Direction::Short => price <= signal.take_profit,
        Direction::Long => price >= signal.take_profit,
    };

    let status = if hit_stop {
        SignalStatus::StopHit
    } else if hit_target {
        SignalStatus::TargetHit
    } else {
        return None;
    };

    Some(Closure {
        status,
        exit_price: Some(price),
        pnl_percent: Some(pnl_percent(signal.direction, signal.entry_price, price)),
        closed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::active_signal;

    fn now() -> DateTime<Utc> {
        "2024-01-15T15:00:00Z".parse().unwrap()
    }

    #[test]
    fn long_target_hit_with_positive_pnl() {
        let sig = active_signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0);
        let closure = evaluate(&sig, 104.5, now()).unwrap();
        assert_eq!(closure.status, SignalStatus::TargetHit);
        assert_eq!(closure.exit_price, Some(104.5));
        assert!(closure.pnl_percent.unwrap() > 0.0);
        assert!((closure.pnl_percent.unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(closure.closed_at, now());
    }

    #[test]
    fn long_stop_hit_with_negative_pnl() {
        let sig = active_signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0);
        let closure = evaluate(&sig, 97.5, now()).unwrap();
        assert_eq!(closure.status, SignalStatus::StopHit);
        assert!(closure.pnl_percent.unwrap() < 0.0);
    }

    #[test]
    fn short_target_hit() {
        let sig = active_signal("ETHUSDT", Direction::Short, 99.0, 103.0, 91.0);
        let closure = evaluate(&sig, 90.5, now()).unwrap();
        assert_eq!(closure.status, SignalStatus::TargetHit);
        // Favorable move for a short is entry - exit
        assert!((closure.pnl_percent.unwrap() - (99.0 - 90.5) / 99.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn short_stop_hit() {
        let sig = active_signal("ETHUSDT", Direction::Short, 99.0, 103.0, 91.0);
        let closure = evaluate(&sig, 103.0, now()).unwrap();
        assert_eq!(closure.status, SignalStatus::StopHit);
        assert!(closure.pnl_percent.unwrap() < 0.0);
    }

    #[test]
    fn price_between_levels_is_no_decision() {
        let sig = active_signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0);
        assert!(evaluate(&sig, 101.0, now()).is_none());
    }

    #[test]
    fn stop_takes_precedence_when_both_hold() {
        // Degenerate geometry (stop above target for a long) so a single
        // price satisfies both conditions; the adverse outcome must win.
        let sig = active_signal("BTCUSDT", Direction::Long, 100.0, 100.5, 99.5);
        let closure = evaluate(&sig, 100.0, now()).unwrap();
        assert_eq!(closure.status, SignalStatus::StopHit);
    }

    #[test]
    fn pnl_percent_signs() {
        assert!(pnl_percent(Direction::Long, 100.0, 110.0) > 0.0);
        assert!(pnl_percent(Direction::Long, 100.0, 95.0) < 0.0);
        assert!(pnl_percent(Direction::Short, 100.0, 95.0) > 0.0);
        assert!(pnl_percent(Direction::Short, 100.0, 110.0) < 0.0);
    }
}
