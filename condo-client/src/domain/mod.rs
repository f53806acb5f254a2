mod bill;
mod meter;
mod setting;
mod unit;

pub use bill::{Bill, BillType, ParseBillTypeError};
pub use meter::{Meter, MeterType, ParseMeterTypeError, Reading};
pub use setting::Setting;
pub use unit::Unit;
