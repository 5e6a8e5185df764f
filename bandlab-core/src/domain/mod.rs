//! Domain types: bars, price series, strategy parameters.

pub mod bar;
pub mod params;
pub mod series;

pub use bar::{Bar, Interval, OutputSize};
pub use params::{ParamError, ParameterSet};
pub use series::{PriceSeries, SeriesError};

