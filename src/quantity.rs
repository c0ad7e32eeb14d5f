//! Static lookup tables for quantity types.
//!
//! Maps store quantity ids and short codes onto canonical metric keys,
//! display names and icons, and holds the per-quantity aggregation
//! strategy used by the aggregator. Nothing here touches the store.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::QuantityType;

// ---

/// Quantity id of the rainfall gauge, reported as a daily total.
pub const PRECIPITATION_ID: i32 = 50;

/// Canonical metric keys for the known quantity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    // ---
    AirTemperature,
    ElectricalConductivity,
    SoilPh,
    Nitrogen,
    Phosphorus,
    Potassium,
    Co2,
    Precipitation,
    RainDetection,
    SoilMoisture,
    UltravioletIndex,
    WindSpeed,
    WindQuadrant,
    WindDirection,
    AirHumidity,
}

/// (quantity id, short code, key) for every quantity the store is known to hold.
const KNOWN_QUANTITIES: [(i32, &str, MetricKey); 15] = [
    (37, "t", MetricKey::AirTemperature),
    (44, "ec", MetricKey::ElectricalConductivity),
    (45, "ph", MetricKey::SoilPh),
    (46, "n", MetricKey::Nitrogen),
    (47, "p", MetricKey::Phosphorus),
    (48, "k", MetricKey::Potassium),
    (49, "ppm", MetricKey::Co2),
    (50, "mm", MetricKey::Precipitation),
    (51, "an", MetricKey::RainDetection),
    (52, "m", MetricKey::SoilMoisture),
    (53, "raw", MetricKey::UltravioletIndex),
    (54, "s", MetricKey::WindSpeed),
    (55, "dc", MetricKey::WindQuadrant),
    (56, "dg", MetricKey::WindDirection),
    (57, "h", MetricKey::AirHumidity),
];

impl MetricKey {
    // ---
    pub fn from_quantity_id(id: i32) -> Option<Self> {
        KNOWN_QUANTITIES
            .iter()
            .find(|(qid, _, _)| *qid == id)
            .map(|(_, _, key)| *key)
    }

    pub fn from_short_code(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        KNOWN_QUANTITIES
            .iter()
            .find(|(_, short, _)| *short == code)
            .map(|(_, _, key)| *key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::AirTemperature => "airTemperature",
            MetricKey::ElectricalConductivity => "electricalConductivity",
            MetricKey::SoilPh => "soilPH",
            MetricKey::Nitrogen => "nitrogen",
            MetricKey::Phosphorus => "phosphorus",
            MetricKey::Potassium => "potassium",
            MetricKey::Co2 => "co2",
            MetricKey::Precipitation => "precipitation",
            MetricKey::RainDetection => "rainDetection",
            MetricKey::SoilMoisture => "soilMoisture",
            MetricKey::UltravioletIndex => "ultravioletIndex",
            MetricKey::WindSpeed => "windSpeed",
            MetricKey::WindQuadrant => "windQuadrant",
            MetricKey::WindDirection => "windDirection",
            MetricKey::AirHumidity => "airHumidity",
        }
    }

    /// Portuguese label shown on dashboard cards.
    pub fn display_name(&self) -> &'static str {
        match self {
            MetricKey::AirTemperature => "Temperatura do Ar",
            MetricKey::ElectricalConductivity => "Condutividade Elétrica",
            MetricKey::SoilPh => "pH do Solo",
            MetricKey::Nitrogen => "Nitrogênio",
            MetricKey::Phosphorus => "Fósforo",
            MetricKey::Potassium => "Potássio",
            MetricKey::Co2 => "CO₂",
            MetricKey::Precipitation => "Precipitação",
            MetricKey::RainDetection => "Detecção de Chuva",
            MetricKey::SoilMoisture => "Umidade do Solo",
            MetricKey::UltravioletIndex => "Índice Ultravioleta",
            MetricKey::WindSpeed => "Velocidade do Vento",
            MetricKey::WindQuadrant => "Quadrante do Vento",
            MetricKey::WindDirection => "Direção do Vento",
            MetricKey::AirHumidity => "Umidade do Ar",
        }
    }

    pub fn icon(&self) -> Icon {
        match self {
            MetricKey::AirTemperature => Icon::Thermometer,
            MetricKey::AirHumidity | MetricKey::SoilMoisture => Icon::Droplets,
            MetricKey::WindSpeed => Icon::Wind,
            MetricKey::WindDirection => Icon::Navigation,
            MetricKey::WindQuadrant => Icon::Compass,
            MetricKey::SoilPh => Icon::FlaskConical,
            MetricKey::ElectricalConductivity => Icon::Zap,
            MetricKey::Nitrogen => Icon::Sprout,
            MetricKey::Phosphorus | MetricKey::Potassium => Icon::Leaf,
            MetricKey::Co2 | MetricKey::Precipitation | MetricKey::RainDetection => {
                Icon::CloudDrizzle
            }
            MetricKey::UltravioletIndex => Icon::Sun,
        }
    }
}

/// Resolve the metric key for a quantity: by id, then by short code, and
/// finally the short code itself for quantities outside the known table.
pub fn metric_key_for(quantity: &QuantityType) -> String {
    MetricKey::from_quantity_id(quantity.id)
        .or_else(|| MetricKey::from_short_code(&quantity.short_code))
        .map(|key| key.as_str().to_string())
        .unwrap_or_else(|| quantity.short_code.clone())
}

/// Display name for a quantity, never empty.
pub fn display_name_for(quantity: &QuantityType) -> String {
    if let Some(key) = MetricKey::from_quantity_id(quantity.id) {
        return key.display_name().to_string();
    }
    match quantity.description.as_deref().map(str::trim) {
        Some(desc) if !desc.is_empty() => desc.to_string(),
        _ => quantity.short_code.clone(),
    }
}

// ---

/// Icon names understood by the dashboard front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Icon {
    // ---
    Thermometer,
    Droplets,
    Wind,
    FlaskConical,
    Zap,
    Sprout,
    Leaf,
    CloudDrizzle,
    Sun,
    Gauge,
    Navigation,
    Compass,
}

/// Lowercase, trim and strip Portuguese diacritics.
fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Icon for a metric key, short code or free-text description.
///
/// Known keys and short codes map exactly; descriptions are matched by
/// keyword. Anything else gets [`Icon::Gauge`].
pub fn icon_for(name: &str) -> Icon {
    // ---
    if let Some(key) = KNOWN_QUANTITIES
        .iter()
        .map(|(_, _, key)| *key)
        .find(|key| key.as_str() == name)
    {
        return key.icon();
    }
    if let Some(key) = MetricKey::from_short_code(name) {
        return key.icon();
    }

    let n = normalize(name);

    if n.contains("temperatura") {
        Icon::Thermometer
    } else if n.contains("umidade") {
        Icon::Droplets
    } else if n.contains("vento") || n.contains("anemometro") {
        Icon::Wind
    } else if n.contains("ph") {
        Icon::FlaskConical
    } else if n.contains("condutividade") {
        Icon::Zap
    } else if n.contains("nitrogenio") {
        Icon::Sprout
    } else if n.contains("fosforo") || n.contains("potassio") {
        Icon::Leaf
    } else if ["co2", "co²", "chuva", "precipitacao"]
        .iter()
        .any(|kw| n.contains(kw))
    {
        Icon::CloudDrizzle
    } else if n.contains("ultravioleta") || n.contains("uv") {
        Icon::Sun
    } else {
        Icon::Gauge
    }
}

// ---

/// How the "current" value of a quantity is derived from its readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// The reading with the latest timestamp.
    Latest,
    /// Sum of all readings taken during the current local calendar day.
    DailySum,
}

/// Per-quantity aggregation rules; quantities without a rule use `Latest`.
#[derive(Debug, Clone)]
pub struct AggregationRules {
    rules: HashMap<i32, Aggregation>,
}

impl AggregationRules {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, quantity_id: i32, aggregation: Aggregation) -> Self {
        self.rules.insert(quantity_id, aggregation);
        self
    }

    pub fn for_quantity(&self, quantity_id: i32) -> Aggregation {
        self.rules
            .get(&quantity_id)
            .copied()
            .unwrap_or(Aggregation::Latest)
    }
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self::new().with_rule(PRECIPITATION_ID, Aggregation::DailySum)
    }
}

// ---

/// Qualitative reading of the conductive rain sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RainLevelKind {
    Dry,
    Mist,
    Light,
    Moderate,
    Heavy,
    Intense,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainLevel {
    pub level: RainLevelKind,
    pub label: &'static str,
    pub description: &'static str,
}

const RAIN_SENSOR_MAX: f64 = 4095.0;

impl RainLevel {
    /// Interpret a raw 12-bit ADC value: 4095 is a dry plate, 0 fully wet.
    pub fn from_raw(raw: f64) -> Self {
        // ---
        let value = raw.clamp(0.0, RAIN_SENSOR_MAX);
        let wetness = (RAIN_SENSOR_MAX - value) / RAIN_SENSOR_MAX * 100.0;

        let (level, label, description) = if wetness <= 1.0 {
            (RainLevelKind::Dry, "Seco", "Sem detecção de chuva")
        } else if wetness <= 10.0 {
            (RainLevelKind::Mist, "Neblina/Orvalho", "Umidade leve detectada")
        } else if wetness <= 30.0 {
            (RainLevelKind::Light, "Chuva Fraca", "Chuva leve ou garoa")
        } else if wetness <= 60.0 {
            (RainLevelKind::Moderate, "Chuva Moderada", "Chuva moderada detectada")
        } else if wetness <= 85.0 {
            (RainLevelKind::Heavy, "Chuva Forte", "Chuva forte detectada")
        } else {
            (RainLevelKind::Intense, "Chuva Intensa", "Chuva muito intensa")
        };

        RainLevel {
            level,
            label,
            description,
        }
    }
}
