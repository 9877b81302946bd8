//! GeoKey directory decoding and encoding.
//!
//! A GeoKeyDirectory (tag 34735) is a 4-short header followed by
//! `[key, location, count, value]` entries. Location 0 means `value` is the
//! short itself; location 34736 means `value` indexes GeoDoubleParams.
//!
//! Registered systems map to [`Crs::Epsg`]. User-defined ones (code 32767)
//! are rebuilt from the projection and ellipsoid keys as a PROJ.4 string,
//! and the same tables drive writing such a string back out.

use std::collections::BTreeMap;

use projection::definitions::{is_geographic, proj_definition};
use tracing::{debug, warn};
use viewer_common::Crs;

pub const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
pub const GEO_DOUBLE_PARAMS_TAG: u16 = 34736;

pub const GT_MODEL_TYPE_KEY: u16 = 1024;
pub const GT_RASTER_TYPE_KEY: u16 = 1025;
pub const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
pub const GEOG_GEODETIC_DATUM_KEY: u16 = 2050;
pub const GEOG_ELLIPSOID_KEY: u16 = 2056;
pub const GEOG_SEMI_MAJOR_AXIS_KEY: u16 = 2057;
pub const GEOG_SEMI_MINOR_AXIS_KEY: u16 = 2058;
pub const GEOG_INV_FLATTENING_KEY: u16 = 2059;
pub const PROJECTED_CS_TYPE_KEY: u16 = 3072;
pub const PROJECTION_KEY: u16 = 3074;
pub const PROJ_COORD_TRANS_KEY: u16 = 3075;
pub const PROJ_LINEAR_UNITS_KEY: u16 = 3076;
pub const PROJ_LINEAR_UNIT_SIZE_KEY: u16 = 3077;
pub const PROJ_STD_PARALLEL_1_KEY: u16 = 3078;
pub const PROJ_STD_PARALLEL_2_KEY: u16 = 3079;
pub const PROJ_NAT_ORIGIN_LONG_KEY: u16 = 3080;
pub const PROJ_NAT_ORIGIN_LAT_KEY: u16 = 3081;
pub const PROJ_FALSE_EASTING_KEY: u16 = 3082;
pub const PROJ_FALSE_NORTHING_KEY: u16 = 3083;
pub const PROJ_FALSE_ORIGIN_LONG_KEY: u16 = 3084;
pub const PROJ_FALSE_ORIGIN_LAT_KEY: u16 = 3085;
pub const PROJ_FALSE_ORIGIN_EASTING_KEY: u16 = 3086;
pub const PROJ_FALSE_ORIGIN_NORTHING_KEY: u16 = 3087;
pub const PROJ_SCALE_AT_NAT_ORIGIN_KEY: u16 = 3092;
pub const PROJ_STRAIGHT_VERT_POLE_LONG_KEY: u16 = 3095;

pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub const RASTER_PIXEL_IS_AREA: u16 = 1;
pub const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Key value meaning "user-defined", i.e. no EPSG code.
pub const USER_DEFINED: u16 = 32767;

const CT_POLAR_STEREOGRAPHIC: u16 = 15;

/// EPSG projection codes for UTM zones on WGS84-like datums.
const UTM_NORTH_BASE: u16 = 16000;
const UTM_SOUTH_BASE: u16 = 16100;

const LINEAR_UNITS: &[(u16, &str)] = &[(9001, "m"), (9002, "ft"), (9003, "us-ft")];

const DATUMS: &[(u16, &str)] = &[(6326, "WGS84"), (6269, "NAD83")];

const ELLIPSOIDS: &[(u16, &str)] = &[
    (7001, "airy"),
    (7004, "bessel"),
    (7008, "clrk66"),
    (7019, "GRS80"),
    (7022, "intl"),
    (7024, "krass"),
    (7030, "WGS84"),
];

/// A coordinate transformation method and how its PROJ.4 parameters map
/// onto projection keys.
struct Method {
    code: u16,
    proj: &'static str,
    params: &'static [(&'static str, u16)],
}

const METHODS: &[Method] = &[
    Method {
        code: 1,
        proj: "tmerc",
        params: &[
            ("lat_0", PROJ_NAT_ORIGIN_LAT_KEY),
            ("lon_0", PROJ_NAT_ORIGIN_LONG_KEY),
            ("k_0", PROJ_SCALE_AT_NAT_ORIGIN_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
    Method {
        code: 7,
        proj: "merc",
        params: &[
            ("lon_0", PROJ_NAT_ORIGIN_LONG_KEY),
            ("k_0", PROJ_SCALE_AT_NAT_ORIGIN_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
    Method {
        code: 8,
        proj: "lcc",
        params: &[
            ("lat_1", PROJ_STD_PARALLEL_1_KEY),
            ("lat_2", PROJ_STD_PARALLEL_2_KEY),
            ("lat_0", PROJ_FALSE_ORIGIN_LAT_KEY),
            ("lon_0", PROJ_FALSE_ORIGIN_LONG_KEY),
            ("x_0", PROJ_FALSE_ORIGIN_EASTING_KEY),
            ("y_0", PROJ_FALSE_ORIGIN_NORTHING_KEY),
        ],
    },
    Method {
        code: 9,
        proj: "lcc",
        params: &[
            ("lat_1", PROJ_NAT_ORIGIN_LAT_KEY),
            ("lat_0", PROJ_NAT_ORIGIN_LAT_KEY),
            ("lon_0", PROJ_NAT_ORIGIN_LONG_KEY),
            ("k_0", PROJ_SCALE_AT_NAT_ORIGIN_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
    Method {
        code: 11,
        proj: "aea",
        params: &[
            ("lat_1", PROJ_STD_PARALLEL_1_KEY),
            ("lat_2", PROJ_STD_PARALLEL_2_KEY),
            ("lat_0", PROJ_NAT_ORIGIN_LAT_KEY),
            ("lon_0", PROJ_NAT_ORIGIN_LONG_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
    Method {
        code: CT_POLAR_STEREOGRAPHIC,
        proj: "stere",
        params: &[
            ("lat_ts", PROJ_NAT_ORIGIN_LAT_KEY),
            ("lon_0", PROJ_STRAIGHT_VERT_POLE_LONG_KEY),
            ("k_0", PROJ_SCALE_AT_NAT_ORIGIN_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
    Method {
        code: 17,
        proj: "eqc",
        params: &[
            ("lat_ts", PROJ_STD_PARALLEL_1_KEY),
            ("lon_0", PROJ_NAT_ORIGIN_LONG_KEY),
            ("x_0", PROJ_FALSE_EASTING_KEY),
            ("y_0", PROJ_FALSE_NORTHING_KEY),
        ],
    },
];

/// Keys commonly written in place of the method's own.
fn alternate_key(key: u16) -> Option<u16> {
    match key {
        PROJ_FALSE_ORIGIN_LAT_KEY => Some(PROJ_NAT_ORIGIN_LAT_KEY),
        PROJ_FALSE_ORIGIN_LONG_KEY => Some(PROJ_NAT_ORIGIN_LONG_KEY),
        PROJ_FALSE_ORIGIN_EASTING_KEY => Some(PROJ_FALSE_EASTING_KEY),
        PROJ_FALSE_ORIGIN_NORTHING_KEY => Some(PROJ_FALSE_NORTHING_KEY),
        PROJ_STRAIGHT_VERT_POLE_LONG_KEY => Some(PROJ_NAT_ORIGIN_LONG_KEY),
        _ => None,
    }
}

fn lookup_name(table: &'static [(u16, &'static str)], code: u16) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

fn lookup_code(table: &[(u16, &str)], name: &str) -> Option<u16> {
    table.iter().find(|(_, n)| *n == name).map(|(code, _)| *code)
}

// ============================================================================
// Decoding
// ============================================================================

/// Keys from a GeoKeyDirectory, with double-valued keys resolved against
/// GeoDoubleParams. ASCII keys are not needed and are skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct GeoKeys {
    shorts: BTreeMap<u16, u16>,
    doubles: BTreeMap<u16, f64>,
}

impl GeoKeys {
    pub(crate) fn parse(directory: &[u16], double_params: &[f64]) -> Self {
        let mut keys = GeoKeys::default();
        let Some(&declared) = directory.get(3) else {
            return keys;
        };

        for entry in directory[4..].chunks_exact(4).take(declared as usize) {
            let (key, location, count, value) = (entry[0], entry[1], entry[2], entry[3]);
            match location {
                0 => {
                    keys.shorts.insert(key, value);
                }
                GEO_DOUBLE_PARAMS_TAG if count >= 1 => {
                    if let Some(&v) = double_params.get(value as usize) {
                        keys.doubles.insert(key, v);
                    }
                }
                _ => {}
            }
        }
        keys
    }

    pub(crate) fn short(&self, key: u16) -> Option<u16> {
        self.shorts.get(&key).copied()
    }

    pub(crate) fn double(&self, key: u16) -> Option<f64> {
        self.doubles.get(&key).copied()
    }

    pub(crate) fn is_pixel_is_point(&self) -> bool {
        self.short(GT_RASTER_TYPE_KEY) == Some(RASTER_PIXEL_IS_POINT)
    }

    /// The declared CRS, or `None` when none is declared or a user-defined
    /// one uses a method that cannot be expressed.
    pub(crate) fn crs(&self) -> Option<Crs> {
        let projected = self.short(PROJECTED_CS_TYPE_KEY);
        let geographic = self.short(GEOGRAPHIC_TYPE_KEY);
        let is_projected = match self.short(GT_MODEL_TYPE_KEY) {
            Some(MODEL_TYPE_PROJECTED) => true,
            Some(MODEL_TYPE_GEOGRAPHIC) => false,
            _ => projected.is_some(),
        };

        if is_projected {
            match projected {
                Some(code) if code != USER_DEFINED => Some(Crs::Epsg(code)),
                _ => self.user_defined_projected(),
            }
        } else {
            match geographic? {
                USER_DEFINED => Some(Crs::Proj4(format!(
                    "+proj=longlat {} +no_defs",
                    self.datum_terms()
                ))),
                code => Some(Crs::Epsg(code)),
            }
        }
    }

    fn user_defined_projected(&self) -> Option<Crs> {
        let projection = match self.short(PROJECTION_KEY) {
            Some(code) if (UTM_NORTH_BASE + 1..=UTM_NORTH_BASE + 60).contains(&code) => {
                format!("+proj=utm +zone={}", code - UTM_NORTH_BASE)
            }
            Some(code) if (UTM_SOUTH_BASE + 1..=UTM_SOUTH_BASE + 60).contains(&code) => {
                format!("+proj=utm +zone={} +south", code - UTM_SOUTH_BASE)
            }
            _ => {
                let code = self.short(PROJ_COORD_TRANS_KEY);
                let Some(method) = code.and_then(|c| METHODS.iter().find(|m| m.code == c)) else {
                    warn!(
                        coord_trans = ?code,
                        projection = ?self.short(PROJECTION_KEY),
                        "Unsupported user-defined projection, treating raster as having no CRS"
                    );
                    return None;
                };
                self.method_terms(method)
            }
        };

        let definition = format!(
            "{projection} {} {} +no_defs",
            self.datum_terms(),
            self.unit_terms()
        );
        debug!(definition = %definition, "Built user-defined CRS");
        Some(Crs::Proj4(definition))
    }

    fn method_terms(&self, method: &Method) -> String {
        let mut terms = vec![format!("+proj={}", method.proj)];
        if method.code == CT_POLAR_STEREOGRAPHIC {
            let lat_ts = self.param(PROJ_NAT_ORIGIN_LAT_KEY, 90.0);
            terms.push(format!("+lat_0={}", if lat_ts < 0.0 { -90 } else { 90 }));
        }
        for &(name, key) in method.params {
            let default = if name == "k_0" { 1.0 } else { 0.0 };
            terms.push(format!("+{name}={}", self.param(key, default)));
        }
        terms.join(" ")
    }

    fn param(&self, key: u16, default: f64) -> f64 {
        self.double(key)
            .or_else(|| alternate_key(key).and_then(|alt| self.double(alt)))
            .unwrap_or(default)
    }

    fn datum_terms(&self) -> String {
        if let Some(a) = self.double(GEOG_SEMI_MAJOR_AXIS_KEY) {
            return match (
                self.double(GEOG_SEMI_MINOR_AXIS_KEY),
                self.double(GEOG_INV_FLATTENING_KEY),
            ) {
                (Some(b), _) => format!("+a={a} +b={b}"),
                (None, Some(rf)) => format!("+a={a} +rf={rf}"),
                (None, None) => format!("+a={a} +b={a}"),
            };
        }
        if let Some(name) = self.short(GEOG_ELLIPSOID_KEY).and_then(|c| lookup_name(ELLIPSOIDS, c)) {
            return format!("+ellps={name}");
        }
        if let Some(name) = self.short(GEOG_GEODETIC_DATUM_KEY).and_then(|c| lookup_name(DATUMS, c)) {
            return format!("+datum={name}");
        }
        if let Some(terms) = self
            .short(GEOGRAPHIC_TYPE_KEY)
            .filter(|&c| c != USER_DEFINED)
            .and_then(registered_datum_terms)
        {
            return terms;
        }
        "+datum=WGS84".to_string()
    }

    fn unit_terms(&self) -> String {
        match self.short(PROJ_LINEAR_UNITS_KEY) {
            Some(code) => match lookup_name(LINEAR_UNITS, code) {
                Some(name) => format!("+units={name}"),
                None => match self.double(PROJ_LINEAR_UNIT_SIZE_KEY) {
                    Some(size) => format!("+to_meter={size}"),
                    None => "+units=m".to_string(),
                },
            },
            None => "+units=m".to_string(),
        }
    }
}

/// Datum and ellipsoid terms of a registered geographic CRS.
fn registered_datum_terms(code: u16) -> Option<String> {
    let crs = Crs::Epsg(code);
    let definition = proj_definition(&crs).ok()?;
    let terms: Vec<&str> = definition
        .split_whitespace()
        .filter(|t| {
            ["+datum=", "+ellps=", "+towgs84=", "+a=", "+b=", "+rf="]
                .iter()
                .any(|prefix| t.starts_with(prefix))
        })
        .collect();
    (!terms.is_empty()).then(|| terms.join(" "))
}

// ============================================================================
// Encoding
// ============================================================================

/// A GeoKeyDirectory plus the GeoDoubleParams it refers to.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GeoKeyDirectory {
    pub keys: Vec<u16>,
    pub doubles: Vec<f64>,
}

#[derive(Default)]
struct DirectoryBuilder {
    shorts: BTreeMap<u16, u16>,
    doubles: BTreeMap<u16, f64>,
}

impl DirectoryBuilder {
    fn short(&mut self, key: u16, value: u16) {
        self.shorts.insert(key, value);
    }

    fn double(&mut self, key: u16, value: f64) {
        self.doubles.insert(key, value);
    }

    /// Entries sorted by key, as readers expect.
    fn finish(self) -> GeoKeyDirectory {
        let mut entries: BTreeMap<u16, [u16; 3]> = BTreeMap::new();
        for (key, value) in self.shorts {
            entries.insert(key, [0, 1, value]);
        }
        let mut doubles = Vec::with_capacity(self.doubles.len());
        for (key, value) in self.doubles {
            entries.insert(key, [GEO_DOUBLE_PARAMS_TAG, 1, doubles.len() as u16]);
            doubles.push(value);
        }

        let mut keys = vec![1, 1, 0, entries.len() as u16];
        for (key, [location, count, value]) in entries {
            keys.extend_from_slice(&[key, location, count, value]);
        }
        GeoKeyDirectory { keys, doubles }
    }
}

/// GeoKeys for a CRS, or `None` when it cannot be written as keys.
pub(crate) fn encode(crs: &Crs) -> Option<GeoKeyDirectory> {
    let mut builder = DirectoryBuilder::default();
    builder.short(GT_RASTER_TYPE_KEY, RASTER_PIXEL_IS_AREA);

    match crs {
        Crs::Epsg(code) => {
            let geographic = proj_definition(crs)
                .map(|def| is_geographic(&def))
                .unwrap_or(false);
            if geographic {
                builder.short(GT_MODEL_TYPE_KEY, MODEL_TYPE_GEOGRAPHIC);
                builder.short(GEOGRAPHIC_TYPE_KEY, *code);
            } else {
                builder.short(GT_MODEL_TYPE_KEY, MODEL_TYPE_PROJECTED);
                builder.short(PROJECTED_CS_TYPE_KEY, *code);
            }
        }
        Crs::Proj4(definition) => {
            if let Err(term) = encode_definition(definition, &mut builder) {
                warn!(crs = %definition, term = %term, "Cannot express CRS as GeoKeys");
                return None;
            }
        }
    }
    Some(builder.finish())
}

/// Fill `builder` from a PROJ.4 string; the error names the offending term.
fn encode_definition(definition: &str, builder: &mut DirectoryBuilder) -> Result<(), String> {
    let mut terms: BTreeMap<&str, &str> = BTreeMap::new();
    for term in definition.split_whitespace() {
        let term = term.trim_start_matches('+');
        let (name, value) = term.split_once('=').unwrap_or((term, ""));
        terms.insert(name, value);
    }
    let number = |name: &str| -> Result<f64, String> {
        terms
            .get(name)
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| format!("+{name}"))
    };

    let proj = terms.get("proj").copied().unwrap_or("");
    builder.short(GEOGRAPHIC_TYPE_KEY, USER_DEFINED);

    if matches!(proj, "longlat" | "latlong") {
        builder.short(GT_MODEL_TYPE_KEY, MODEL_TYPE_GEOGRAPHIC);
    } else {
        builder.short(GT_MODEL_TYPE_KEY, MODEL_TYPE_PROJECTED);
        builder.short(PROJECTED_CS_TYPE_KEY, USER_DEFINED);

        if proj == "utm" {
            let zone = number("zone")? as u16;
            let base = if terms.contains_key("south") {
                UTM_SOUTH_BASE
            } else {
                UTM_NORTH_BASE
            };
            builder.short(PROJECTION_KEY, base + zone);
        } else {
            let method = METHODS
                .iter()
                .find(|m| m.proj == proj && m.params.iter().all(|(n, _)| terms.contains_key(n)))
                .ok_or_else(|| format!("+proj={proj}"))?;
            builder.short(PROJECTION_KEY, USER_DEFINED);
            builder.short(PROJ_COORD_TRANS_KEY, method.code);
            for &(name, key) in method.params {
                builder.double(key, number(name)?);
            }
        }

        match (terms.get("units"), terms.get("to_meter")) {
            (Some(units), _) => {
                let code = lookup_code(LINEAR_UNITS, units).ok_or_else(|| format!("+units={units}"))?;
                builder.short(PROJ_LINEAR_UNITS_KEY, code);
            }
            (None, Some(_)) => {
                builder.short(PROJ_LINEAR_UNITS_KEY, USER_DEFINED);
                builder.double(PROJ_LINEAR_UNIT_SIZE_KEY, number("to_meter")?);
            }
            (None, None) => builder.short(PROJ_LINEAR_UNITS_KEY, 9001),
        }
    }

    if let Some(&datum) = terms.get("datum") {
        let code = lookup_code(DATUMS, datum).ok_or_else(|| format!("+datum={datum}"))?;
        builder.short(GEOG_GEODETIC_DATUM_KEY, code);
    } else if let Some(&ellps) = terms.get("ellps") {
        let code = lookup_code(ELLIPSOIDS, ellps).ok_or_else(|| format!("+ellps={ellps}"))?;
        builder.short(GEOG_ELLIPSOID_KEY, code);
    } else if terms.contains_key("a") {
        builder.short(GEOG_ELLIPSOID_KEY, USER_DEFINED);
        builder.double(GEOG_SEMI_MAJOR_AXIS_KEY, number("a")?);
        if terms.contains_key("rf") {
            builder.double(GEOG_INV_FLATTENING_KEY, number("rf")?);
        } else {
            builder.double(GEOG_SEMI_MINOR_AXIS_KEY, number("b")?);
        }
    }

    for unsupported in ["towgs84", "nadgrids", "pm"] {
        if let Some(value) = terms.get(unsupported) {
            return Err(format!("+{unsupported}={value}"));
        }
    }
    Ok(())
}
