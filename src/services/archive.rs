//! netCDF output for sounding records.
//!
//! The schema (dimensions, variable types, fill values and attributes) comes
//! from `radiosonde_metadata.toml`; this module only maps record fields onto
//! it. One file per sounding, named from `nc_file_naming`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::{AppConfig, DataType, DownloadConfig, MetadataConfig, VariableSpec};
use crate::errors::ArchiveError;
use crate::models::SoundingRecord;

/// netCDF default fills, used when a variable declares no `_FillValue`.
const NC_FILL_BYTE: i8 = -127;
const NC_FILL_INT: i32 = -2_147_483_647;
const NC_FILL_FLOAT: f32 = 9.969_21e36;
const NC_FILL_DOUBLE: f64 = 9.969_209_968_386_869e36;

const DEFLATE_LEVEL: i32 = 4;

/// Result of a successful `write` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// The file already existed and overwriting was not requested.
    Skipped(PathBuf),
}

/// Decides whether a missing output directory may be created.
pub type ConfirmCreate = Box<dyn Fn(&Path) -> bool>;

pub struct SoundingArchiver<'a> {
    download: &'a DownloadConfig,
    metadata: &'a MetadataConfig,
    confirm_create: ConfirmCreate,
}

enum TypedValues {
    Byte(Vec<i8>, Option<i8>),
    Int(Vec<i32>, Option<i32>),
    Float(Vec<f32>, Option<f32>),
    Double(Vec<f64>, Option<f64>),
}

impl TypedValues {
    fn convert(spec: &VariableSpec, values: &[Option<f64>]) -> Self {
        macro_rules! typed {
            ($variant:ident, $ty:ty, $default_fill:expr, $conv:expr) => {{
                let conv: fn(f64) -> $ty = $conv;
                let fill = spec.fill_value.map(conv);
                let missing = fill.unwrap_or($default_fill);
                let data = values.iter().map(|v| v.map(conv).unwrap_or(missing)).collect();
                TypedValues::$variant(data, fill)
            }};
        }

        match spec.dtype {
            DataType::Byte => typed!(Byte, i8, NC_FILL_BYTE, |v| v.round() as i8),
            DataType::Int => typed!(Int, i32, NC_FILL_INT, |v| v.round() as i32),
            DataType::Float => typed!(Float, f32, NC_FILL_FLOAT, |v| v as f32),
            DataType::Double => typed!(Double, f64, NC_FILL_DOUBLE, |v| v),
        }
    }
}

struct PreparedVariable<'s> {
    name: &'s str,
    spec: &'s VariableSpec,
    values: TypedValues,
}

impl<'a> SoundingArchiver<'a> {
    /// Archiver that refuses to create a missing output directory.
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            download: &config.download,
            metadata: &config.metadata,
            confirm_create: Box::new(|_| false),
        }
    }

    /// Gate creation of a missing output directory behind `confirm`.
    pub fn confirm_with(mut self, confirm: impl Fn(&Path) -> bool + 'static) -> Self {
        self.confirm_create = Box::new(confirm);
        self
    }

    /// File name for a record: the template with `{sitenum}` and `{date}` filled in.
    pub fn file_name(&self, record: &SoundingRecord) -> Result<String, ArchiveError> {
        let launch_time = record
            .launch_time()
            .ok_or(ArchiveError::MissingLaunchTime(record.station_number()))?;
        Ok(self
            .download
            .nc_file_naming
            .replace("{sitenum}", &record.station_number().to_string())
            .replace("{date}", &launch_time.format("%Y%m%d_%H%M").to_string()))
    }

    /// Write one sounding into `output_dir`.
    ///
    /// An existing file is left alone unless `overwrite` is set.
    pub fn write(
        &self,
        record: SoundingRecord,
        output_dir: &Path,
        overwrite: bool,
    ) -> Result<WriteOutcome, ArchiveError> {
        self.ensure_output_dir(output_dir)?;

        let path = output_dir.join(self.file_name(&record)?);
        if path.is_file() {
            if !overwrite {
                tracing::warn!("{} exists, skipping", path.display());
                return Ok(WriteOutcome::Skipped(path));
            }
            tracing::warn!("{} exists, overwriting", path.display());
        }

        if record.levels().is_empty() {
            return Err(ArchiveError::NoLevels(record.station_number()));
        }

        let dimensions = self.dimension_sizes(&record);
        let variables = self.prepare_variables(&record, &dimensions)?;
        self.write_file(output_dir, &path, &record, &dimensions, variables)?;

        tracing::info!("Wrote {}", path.display());
        Ok(WriteOutcome::Written(path))
    }

    /// Make sure `output_dir` exists, creating it only if the confirmation gate agrees.
    pub fn ensure_output_dir(&self, output_dir: &Path) -> Result<(), ArchiveError> {
        if output_dir.is_dir() {
            return Ok(());
        }

        tracing::warn!("Output directory {} does not exist", output_dir.display());
        if !(self.confirm_create)(output_dir) {
            return Err(ArchiveError::OutputDirMissing(output_dir.to_path_buf()));
        }

        std::fs::create_dir_all(output_dir).map_err(|source| ArchiveError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        tracing::info!("Created output directory {}", output_dir.display());
        Ok(())
    }

    fn dimension_sizes(&self, record: &SoundingRecord) -> BTreeMap<&str, usize> {
        let levels = record.levels().len();
        self.metadata
            .dimensions
            .iter()
            .map(|(name, size)| (name.as_str(), size.resolve(levels)))
            .collect()
    }

    /// Map every configured variable onto record values, checking shapes
    /// before anything touches the disk.
    fn prepare_variables(
        &self,
        record: &SoundingRecord,
        dimensions: &BTreeMap<&str, usize>,
    ) -> Result<Vec<PreparedVariable<'a>>, ArchiveError> {
        let metadata: &'a MetadataConfig = self.metadata;
        let mut prepared = Vec::with_capacity(metadata.variables.len());

        for (name, spec) in &metadata.variables {
            let source = spec.source(name);
            let values = match record.field(source) {
                Some(values) => values,
                None => {
                    tracing::warn!("Variable '{}': record has no field '{}', skipping", name, source);
                    continue;
                }
            };

            let mut expected = 1;
            for dim in &spec.dims {
                let size = dimensions
                    .get(dim.as_str())
                    .ok_or_else(|| ArchiveError::UnknownDimension {
                        variable: name.clone(),
                        dim: dim.clone(),
                    })?;
                expected *= size;
            }
            if values.len() != expected {
                return Err(ArchiveError::ShapeMismatch {
                    variable: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }

            prepared.push(PreparedVariable {
                name: name.as_str(),
                spec,
                values: TypedValues::convert(spec, &values),
            });
        }

        Ok(prepared)
    }

    /// Build the file under a hidden temporary name in `output_dir` and move
    /// it to `path` only once complete. On error the temporary file is removed.
    fn write_file(
        &self,
        output_dir: &Path,
        path: &Path,
        record: &SoundingRecord,
        dimensions: &BTreeMap<&str, usize>,
        variables: Vec<PreparedVariable<'_>>,
    ) -> Result<(), ArchiveError> {
        let staging = tempfile::Builder::new()
            .prefix(".radiosonde-")
            .suffix(".nc.part")
            .tempfile_in(output_dir)
            .map_err(|source| ArchiveError::Staging {
                dir: output_dir.to_path_buf(),
                source,
            })?
            .into_temp_path();

        self.write_netcdf(&staging, record, dimensions, variables)?;

        staging.persist(path).map_err(|e| ArchiveError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })
    }

    fn write_netcdf(
        &self,
        path: &Path,
        record: &SoundingRecord,
        dimensions: &BTreeMap<&str, usize>,
        variables: Vec<PreparedVariable<'_>>,
    ) -> Result<(), ArchiveError> {
        let format = self.download.radiosonde.netcdf_format;
        let mut file = netcdf::create_with(path, format.options())?;

        for (name, size) in dimensions {
            file.add_dimension(name, *size)?;
        }

        // Define everything first, then write data
        for prepared in &variables {
            let dims: Vec<&str> = prepared.spec.dims.iter().map(String::as_str).collect();
            let mut var = match &prepared.values {
                TypedValues::Byte(_, fill) => {
                    let mut var = file.add_variable::<i8>(prepared.name, &dims)?;
                    if let Some(fill) = fill {
                        var.set_fill_value(*fill)?;
                    }
                    var
                }
                TypedValues::Int(_, fill) => {
                    let mut var = file.add_variable::<i32>(prepared.name, &dims)?;
                    if let Some(fill) = fill {
                        var.set_fill_value(*fill)?;
                    }
                    var
                }
                TypedValues::Float(_, fill) => {
                    let mut var = file.add_variable::<f32>(prepared.name, &dims)?;
                    if let Some(fill) = fill {
                        var.set_fill_value(*fill)?;
                    }
                    var
                }
                TypedValues::Double(_, fill) => {
                    let mut var = file.add_variable::<f64>(prepared.name, &dims)?;
                    if let Some(fill) = fill {
                        var.set_fill_value(*fill)?;
                    }
                    var
                }
            };

            if format.is_netcdf4() {
                var.set_compression(DEFLATE_LEVEL, true)?;
            }

            for (key, value) in &prepared.spec.attributes {
                put_variable_attribute(&mut var, prepared.name, key, value)?;
            }
        }

        self.put_global_attributes(&mut file, record)?;

        for prepared in &variables {
            let mut var = match file.variable_mut(prepared.name) {
                Some(var) => var,
                None => continue,
            };
            match &prepared.values {
                TypedValues::Byte(data, _) => var.put_values(data, ..)?,
                TypedValues::Int(data, _) => var.put_values(data, ..)?,
                TypedValues::Float(data, _) => var.put_values(data, ..)?,
                TypedValues::Double(data, _) => var.put_values(data, ..)?,
            }
        }

        Ok(())
    }

    fn put_global_attributes(
        &self,
        file: &mut netcdf::FileMut,
        record: &SoundingRecord,
    ) -> Result<(), ArchiveError> {
        match record.station_name() {
            Some(name) => {
                file.add_attribute("station_name", name)?;
            }
            None => tracing::warn!(
                "No station name for {}, omitting attribute",
                record.station_number()
            ),
        }
        file.add_attribute("station_number", record.station_number())?;

        let coordinates = [
            ("station_latitude", record.station_latitude()),
            ("station_longitude", record.station_longitude()),
            ("station_elevation", record.station_elevation()),
        ];
        for (key, value) in coordinates {
            match value.parsed() {
                Some(v) => {
                    file.add_attribute(key, v)?;
                }
                None => tracing::warn!("No {} in metadata, omitting attribute", key),
            }
        }

        let radiosonde = &self.download.radiosonde;
        file.add_attribute(
            "history",
            provenance(&radiosonde.processor_name, &radiosonde.processor_version).as_str(),
        )?;
        Ok(())
    }
}

/// `"<UTC now>: processed by <name>-<version>"`
pub fn provenance(name: &str, version: &str) -> String {
    format!(
        "{}: processed by {}-{}",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        name,
        version
    )
}

fn put_variable_attribute(
    var: &mut netcdf::VariableMut<'_>,
    variable: &str,
    key: &str,
    value: &toml::Value,
) -> Result<(), ArchiveError> {
    match value {
        toml::Value::String(s) => {
            var.put_attribute(key, s.as_str())?;
        }
        toml::Value::Integer(i) => match i32::try_from(*i) {
            Ok(i) => {
                var.put_attribute(key, i)?;
            }
            Err(_) => {
                var.put_attribute(key, *i as f64)?;
            }
        },
        toml::Value::Float(f) => {
            var.put_attribute(key, *f)?;
        }
        toml::Value::Boolean(b) => {
            var.put_attribute(key, if *b { "true" } else { "false" })?;
        }
        other => tracing::warn!(
            "Variable '{}': attribute '{}' has unsupported type {}, skipping",
            variable,
            key,
            other.type_str()
        ),
    }
    Ok(())
}
