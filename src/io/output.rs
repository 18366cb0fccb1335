//! Sinks receiving detection records.

use super::utils::create_directory_if_missing;
use crate::{
    constants::{EEV_TO_J, MPC_TO_M},
    error::PropagationError,
    fpr,
    geometry::{Dim3, Point3},
    observer::DetectionRecord,
};
use std::{
    fmt, fs,
    io::{self, BufWriter, Write},
    path::Path,
    str::FromStr,
};

/// Defines the properties of an append-only consumer of detection records.
pub trait OutputSink: Send {
    /// Appends the record to the output.
    fn emit(&mut self, record: DetectionRecord) -> io::Result<()>;

    /// Flushes any buffered output.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink collecting records in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput {
    records: Vec<DetectionRecord>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DetectionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl OutputSink for MemoryOutput {
    fn emit(&mut self, record: DetectionRecord) -> io::Result<()> {
        self.records.push(record);
        Ok(())
    }
}

/// Optional columns of text output, written after the core columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputColumn {
    PrimaryIndex,
    Serial,
    Parent,
    Generation,
    StepCount,
    ObserverDistance,
    SourceSpecies,
    SourceEnergy,
    SourcePosition,
    SourceRedshift,
    CreationSpecies,
    CreationEnergy,
    CreationPosition,
}

impl OutputColumn {
    pub fn all() -> [Self; 13] {
        [
            Self::PrimaryIndex,
            Self::Serial,
            Self::Parent,
            Self::Generation,
            Self::StepCount,
            Self::ObserverDistance,
            Self::SourceSpecies,
            Self::SourceEnergy,
            Self::SourcePosition,
            Self::SourceRedshift,
            Self::CreationSpecies,
            Self::CreationEnergy,
            Self::CreationPosition,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PrimaryIndex => "primary_index",
            Self::Serial => "serial",
            Self::Parent => "parent",
            Self::Generation => "generation",
            Self::StepCount => "step_count",
            Self::ObserverDistance => "observer_distance",
            Self::SourceSpecies => "source_species",
            Self::SourceEnergy => "source_energy",
            Self::SourcePosition => "source_position",
            Self::SourceRedshift => "source_redshift",
            Self::CreationSpecies => "creation_species",
            Self::CreationEnergy => "creation_energy",
            Self::CreationPosition => "creation_position",
        }
    }

    fn headers(&self) -> Vec<&'static str> {
        match self {
            Self::PrimaryIndex => vec!["primary"],
            Self::Serial => vec!["serial"],
            Self::Parent => vec!["parent"],
            Self::Generation => vec!["generation"],
            Self::StepCount => vec!["steps"],
            Self::ObserverDistance => vec!["R_obs[Mpc]"],
            Self::SourceSpecies => vec!["ID0"],
            Self::SourceEnergy => vec!["E0[EeV]"],
            Self::SourcePosition => vec!["X0[Mpc]", "Y0[Mpc]", "Z0[Mpc]"],
            Self::SourceRedshift => vec!["z0"],
            Self::CreationSpecies => vec!["ID1"],
            Self::CreationEnergy => vec!["E1[EeV]"],
            Self::CreationPosition => vec!["X1[Mpc]", "Y1[Mpc]", "Z1[Mpc]"],
        }
    }

    fn values(&self, record: &DetectionRecord) -> Vec<String> {
        match self {
            Self::PrimaryIndex => vec![record.primary_index.to_string()],
            Self::Serial => vec![record.serial.to_string()],
            Self::Parent => vec![record
                .parent
                .map_or_else(|| "-1".to_string(), |parent| parent.to_string())],
            Self::Generation => vec![record.generation.to_string()],
            Self::StepCount => vec![record.step_count.to_string()],
            Self::ObserverDistance => vec![format_length(record.observer_distance)],
            Self::SourceSpecies => vec![record.origin.species.code().to_string()],
            Self::SourceEnergy => vec![format_energy(record.origin.energy)],
            Self::SourcePosition => format_position(&record.origin.position),
            Self::SourceRedshift => vec![format!("{:.8e}", record.origin.redshift)],
            Self::CreationSpecies => vec![record.creation.species.code().to_string()],
            Self::CreationEnergy => vec![format_energy(record.creation.energy)],
            Self::CreationPosition => format_position(&record.creation.position),
        }
    }
}

impl fmt::Display for OutputColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OutputColumn {
    type Err = PropagationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|column| column.name() == s.trim())
            .ok_or_else(|| PropagationError::invalid(format!("Unknown output column {}", s)))
    }
}

fn format_energy(energy: fpr) -> String {
    format!("{:.8e}", energy / EEV_TO_J)
}

fn format_length(length: fpr) -> String {
    format!("{:.8e}", length / MPC_TO_M)
}

fn format_position(position: &Point3<fpr>) -> Vec<String> {
    Dim3::slice()
        .iter()
        .map(|&dim| format_length(position[dim]))
        .collect()
}

/// Sink writing tab-separated text with one record per line.
///
/// The core columns are species code, energy [EeV], unwrapped position
/// [Mpc], direction, redshift and trajectory length [Mpc], always in that
/// order and always first. Any optional columns follow.
pub struct TextOutput<W: Write + Send> {
    writer: BufWriter<W>,
    columns: Vec<OutputColumn>,
    header_written: bool,
}

impl TextOutput<fs::File> {
    /// Creates a new text output writing to the given file.
    pub fn create(file_path: &Path, columns: Vec<OutputColumn>) -> io::Result<Self> {
        create_directory_if_missing(file_path)?;
        Ok(Self::new(fs::File::create(file_path)?, columns))
    }
}

impl<W: Write + Send> TextOutput<W> {
    const CORE_HEADERS: [&'static str; 10] = [
        "ID", "E[EeV]", "X[Mpc]", "Y[Mpc]", "Z[Mpc]", "Px", "Py", "Pz", "z", "D[Mpc]",
    ];

    pub fn new(writer: W, columns: Vec<OutputColumn>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            columns,
            header_written: false,
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        let headers = Self::CORE_HEADERS
            .iter()
            .copied()
            .chain(self.columns.iter().flat_map(|column| column.headers()))
            .collect::<Vec<_>>();
        writeln!(self.writer, "# {}", headers.join("\t"))?;
        self.header_written = true;
        Ok(())
    }

    /// Returns the underlying writer, after flushing.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.finish()?;
        self.writer
            .into_inner()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))
    }
}

impl<W: Write + Send> OutputSink for TextOutput<W> {
    fn emit(&mut self, record: DetectionRecord) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
        }
        let mut values = vec![
            record.species.code().to_string(),
            format_energy(record.energy),
        ];
        values.extend(format_position(&record.position));
        values.extend(
            Dim3::slice()
                .iter()
                .map(|&dim| format!("{:.8e}", record.direction[dim])),
        );
        values.push(format!("{:.8e}", record.redshift));
        values.push(format_length(record.trajectory_length));
        for column in self.columns.iter() {
            values.extend(column.values(&record));
        }
        writeln!(self.writer, "{}", values.join("\t"))
    }

    fn finish(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
        }
        self.writer.flush()
    }
}

/// Sink writing each record as a JSON object on its own line.
#[cfg(feature = "json")]
pub struct JsonLinesOutput<W: Write + Send> {
    writer: BufWriter<W>,
}

#[cfg(feature = "json")]
impl JsonLinesOutput<fs::File> {
    /// Creates a new JSON lines output writing to the given file.
    pub fn create(file_path: &Path) -> io::Result<Self> {
        create_directory_if_missing(file_path)?;
        Ok(Self::new(fs::File::create(file_path)?))
    }
}

#[cfg(feature = "json")]
impl<W: Write + Send> JsonLinesOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

#[cfg(feature = "json")]
impl<W: Write + Send> OutputSink for JsonLinesOutput<W> {
    fn emit(&mut self, record: DetectionRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &record)?;
        writeln!(self.writer)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Vec3,
        particle::{ParticleSnapshot, Species},
    };

    fn record() -> DetectionRecord {
        let snapshot = ParticleSnapshot {
            species: Species::proton(),
            energy: 10.0 * EEV_TO_J,
            position: Point3::new(MPC_TO_M, 0.0, 0.0),
            direction: Vec3::new(1.0, 0.0, 0.0),
            redshift: 0.1,
        };
        DetectionRecord {
            primary_index: 3,
            serial: 0,
            parent: None,
            generation: 0,
            step_count: 12,
            species: Species::proton(),
            energy: 5.0 * EEV_TO_J,
            position: Point3::new(2.0 * MPC_TO_M, 0.0, 0.0),
            direction: Vec3::new(0.0, 1.0, 0.0),
            redshift: 0.05,
            trajectory_length: 40.0 * MPC_TO_M,
            observer_distance: 0.5 * MPC_TO_M,
            origin: snapshot.clone(),
            creation: snapshot,
        }
    }

    #[test]
    fn core_columns_come_first() {
        let mut output = TextOutput::new(
            Vec::new(),
            vec![OutputColumn::SourceEnergy, OutputColumn::Parent],
        );
        output.emit(record()).unwrap();
        let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("# ID\tE[EeV]\tX[Mpc]"));
        assert!(header.ends_with("D[Mpc]\tE0[EeV]\tparent"));

        let values = lines.next().unwrap().split('\t').collect::<Vec<_>>();
        assert_eq!(values.len(), 12);
        assert_eq!(values[0], "2212");
        assert_eq!(values[1].parse::<f64>().unwrap(), 5.0);
        assert_eq!(values[9].parse::<f64>().unwrap(), 40.0);
        assert_eq!(values[10].parse::<f64>().unwrap(), 10.0);
        assert_eq!(values[11], "-1");
    }

    #[test]
    fn empty_output_still_has_header() {
        let mut output = TextOutput::new(Vec::new(), Vec::new());
        output.finish().unwrap();
        let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn columns_are_parsed_by_name() {
        assert_eq!(
            "source_redshift".parse::<OutputColumn>().unwrap(),
            OutputColumn::SourceRedshift
        );
        assert!("bogus".parse::<OutputColumn>().is_err());
    }
}
