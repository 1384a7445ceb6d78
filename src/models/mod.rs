pub mod candle;
pub mod direction;
pub mod signal;
pub mod timeframe;

pub use candle::{Candle, CandleSeries};
pub use direction::*;
pub use signal::{Closure, NewSignal, Signal};
pub use timeframe::Timeframe;
