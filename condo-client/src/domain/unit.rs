/// A housing unit of the condominium, as kept by the unit registry.
///
/// The `monthly_*` fields are flat fees charged instead of (or on top of)
/// the proportional apportionment, depending on how the unit is occupied.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unit {
    pub id: i64,
    pub number: String,
    pub name: Option<String>,
    /// Square meters, strictly positive.
    pub surface_area: f64,
    pub is_inhabited: bool,
    pub is_commercial: bool,
    pub has_staircase_lights: bool,
    pub monthly_water_fixed: f64,
    pub monthly_elec_fixed_winter: f64,
    pub monthly_elec_fixed_summer: f64,
    pub monthly_gas_fixed_winter: f64,
    pub monthly_gas_fixed_summer: f64,
}

impl Unit {
    /// Inhabited and not commercial: the only units taking part in every
    /// proportional quota.
    pub fn is_residential(&self) -> bool {
        self.is_inhabited && !self.is_commercial
    }
}
