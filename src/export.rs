//! Weight export for embedded targets.
//!
//! Two text encodings are produced, both walking the network layer by layer, then by
//! destination unit, then by source unit (bias last):
//!
//! - firmware literals, one `weights[i][j][k] = w;` assignment per weight, for pasting into a
//!   C array initializer;
//! - a fixed-point memory image, one `@addr 0xhhh  // w` line per weight, for a
//!   `$readmemh` directive. The field is the weight scaled by the bitstream length and held
//!   in a 12-bit two's-complement window.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stochastic::DEFAULT_BITSTREAM_LENGTH;
use crate::{Dense, Error, Instance, Network, Result};

const FIELD_BITS: u32 = 12;
const FIELD_MASK: i64 = (1 << FIELD_BITS) - 1;
const FIELD_MIN: i64 = -(1 << (FIELD_BITS - 1));
const FIELD_MAX: i64 = (1 << (FIELD_BITS - 1)) - 1;

pub const FIRMWARE_FILE: &str = "weights.txt";
pub const MEMORY_IMAGE_FILE: &str = "weights.dat";

/// What to do with a scaled weight that does not fit the 12-bit field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    /// Clamp to `[-2048, 2047]`.
    #[default]
    Saturate,
    /// Truncate toward zero and keep the low 12 bits, matching images produced by older
    /// tooling bit for bit. Large weights come out with the wrong magnitude and possibly
    /// the wrong sign.
    Wrap,
}

impl FromStr for Overflow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "saturate" => Ok(Self::Saturate),
            "wrap" => Ok(Self::Wrap),
            _ => Err(Error::InvalidConfig(format!(
                "unknown overflow mode `{s}` (expected `saturate` or `wrap`)"
            ))),
        }
    }
}

/// Which artifacts [`WeightExporter::export_to_dir`] writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTarget {
    /// `weights.txt` only.
    Firmware,
    /// `weights.dat` only.
    #[serde(alias = "memory")]
    MemoryImage,
    #[default]
    Both,
}

impl ExportTarget {
    pub fn file_names(self) -> &'static [&'static str] {
        match self {
            Self::Firmware => &[FIRMWARE_FILE],
            Self::MemoryImage => &[MEMORY_IMAGE_FILE],
            Self::Both => &[FIRMWARE_FILE, MEMORY_IMAGE_FILE],
        }
    }
}

impl FromStr for ExportTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firmware" | "mcu" => Ok(Self::Firmware),
            "memory" | "memory-image" | "fpga" => Ok(Self::MemoryImage),
            "both" => Ok(Self::Both),
            _ => Err(Error::InvalidConfig(format!(
                "unknown export target `{s}` (expected `firmware`, `memory` or `both`)"
            ))),
        }
    }
}

/// 12-bit two's-complement fixed-point codec with a power-of-two-ish scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    scale: usize,
    overflow: Overflow,
}

impl Default for FixedPoint {
    fn default() -> Self {
        Self {
            scale: DEFAULT_BITSTREAM_LENGTH,
            overflow: Overflow::Saturate,
        }
    }
}

impl FixedPoint {
    pub fn new(scale: usize, overflow: Overflow) -> Result<Self> {
        if scale == 0 {
            return Err(Error::InvalidConfig("fixed-point scale must be > 0".to_owned()));
        }
        Ok(Self { scale, overflow })
    }

    #[inline]
    pub fn scale(&self) -> usize {
        self.scale
    }

    #[inline]
    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// `w * scale` as a signed integer, before any range handling: rounded under
    /// `Saturate`, truncated toward zero under `Wrap`.
    #[inline]
    pub fn quantize(&self, w: f64) -> i64 {
        let scaled = w * self.scale as f64;
        match self.overflow {
            Overflow::Saturate => scaled.round() as i64,
            Overflow::Wrap => scaled.trunc() as i64,
        }
    }

    /// Whether `w` survives encoding without clamping or wrapping.
    #[inline]
    pub fn fits(&self, w: f64) -> bool {
        (FIELD_MIN..=FIELD_MAX).contains(&self.quantize(w))
    }

    /// The 12-bit field for `w`, in the low bits of the result.
    pub fn encode(&self, w: f64) -> u16 {
        let q = self.quantize(w);
        let q = match self.overflow {
            Overflow::Saturate => q.clamp(FIELD_MIN, FIELD_MAX),
            Overflow::Wrap => q,
        };
        (q & FIELD_MASK) as u16
    }

    /// Sign-extends a 12-bit field and divides by the scale.
    pub fn decode(&self, field: u16) -> f64 {
        let raw = i64::from(field) & FIELD_MASK;
        let signed = if raw > FIELD_MAX { raw - (1 << FIELD_BITS) } else { raw };
        signed as f64 / self.scale as f64
    }
}

/// Writes a network's weights in the firmware and memory-image encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightExporter {
    fixed: FixedPoint,
}

impl WeightExporter {
    pub fn new(fixed: FixedPoint) -> Self {
        Self { fixed }
    }

    #[inline]
    pub fn fixed_point(&self) -> FixedPoint {
        self.fixed
    }

    /// Firmware literals. Destination blocks are separated by one blank line.
    pub fn write_firmware<W: Write>(&self, net: &Network, mut out: W) -> Result<()> {
        let blocks = total_blocks(net);
        let mut block = 0;
        for (layer, dense) in dense_layers(net) {
            writeln!(out, "// Weights from layer {layer} to layer {}", layer + 1)?;
            for dst in 0..dense.out_units() {
                writeln!(out, "// Weights feeding into layer {}, node {dst}", layer + 1)?;
                for src in 0..dense.in_width() {
                    let w = dense.weight(src, dst);
                    writeln!(out, "weights[{layer}][{dst}][{src}] = {w:?};")?;
                }
                block += 1;
                if block < blocks {
                    writeln!(out)?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Fixed-point memory image. Returns the number of `@` lines written, which is also the
    /// next free address.
    pub fn write_memory_image<W: Write>(&self, net: &Network, mut out: W) -> Result<usize> {
        let mut address = 0usize;
        let mut overflowed = 0usize;
        for (layer, dense) in dense_layers(net) {
            writeln!(out, "// Weights from layer {layer} to layer {}", layer + 1)?;
            for dst in 0..dense.out_units() {
                writeln!(out, "// Weights feeding into layer {}, node {dst}", layer + 1)?;
                for src in 0..dense.in_width() {
                    let w = dense.weight(src, dst);
                    if !self.fixed.fits(w) {
                        overflowed += 1;
                        log::warn!(
                            "weights[{layer}][{dst}][{src}] = {w:.5} does not fit 12 bits at scale {} ({:?})",
                            self.fixed.scale,
                            self.fixed.overflow
                        );
                    }
                    writeln!(out, "@{address} 0x{:03x}  // {w:.5}", self.fixed.encode(w))?;
                    address += 1;
                }
            }
        }
        out.flush()?;
        if overflowed > 0 {
            log::warn!("{overflowed} of {address} weights did not fit the memory-image field");
        }
        Ok(address)
    }

    pub fn firmware_string(&self, net: &Network) -> Result<String> {
        let mut buf = Vec::new();
        self.write_firmware(net, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn memory_image_string(&self, net: &Network) -> Result<String> {
        let mut buf = Vec::new();
        self.write_memory_image(net, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the artifacts selected by `target` into `dir`, creating it if needed. Returns
    /// the written paths in `weights.txt`, `weights.dat` order.
    pub fn export_to_dir<P: AsRef<Path>>(
        &self,
        net: &Network,
        dir: P,
        target: ExportTarget,
    ) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| Error::Export {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(2);
        for &name in target.file_names() {
            let path = dir.join(name);
            let file = create(&path)?;
            let result = if name == FIRMWARE_FILE {
                self.write_firmware(net, file)
            } else {
                self.write_memory_image(net, file).map(|_| ())
            };
            result.map_err(|e| with_path(e, &path))?;
            log::info!("wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Write every instance as `@<n> <digits>` for a `$readmemb` directive: each feature
/// rendered as its integer part, then the label as `num_classes` one-hot bits, with no
/// separators.
pub fn write_instance_image<W: Write>(
    instances: &[Instance],
    num_classes: usize,
    mut out: W,
) -> Result<usize> {
    for (n, instance) in instances.iter().enumerate() {
        if instance.label >= num_classes {
            return Err(Error::InvalidData(format!(
                "instance {n} has label {} but only {num_classes} classes",
                instance.label
            )));
        }
        write!(out, "@{n} ")?;
        for &x in &instance.input {
            write!(out, "{}", x.trunc() as i64)?;
        }
        for class in 0..num_classes {
            write!(out, "{}", u8::from(class == instance.label))?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(instances.len())
}

/// [`write_instance_image`] into a file at `path`.
pub fn export_instance_image<P: AsRef<Path>>(
    instances: &[Instance],
    num_classes: usize,
    path: P,
) -> Result<usize> {
    let path = path.as_ref();
    let file = create(path)?;
    let n = write_instance_image(instances, num_classes, file).map_err(|e| with_path(e, path))?;
    log::info!("wrote {n} instances to {}", path.display());
    Ok(n)
}

fn dense_layers(net: &Network) -> impl Iterator<Item = (usize, &Dense)> + '_ {
    (0..net.num_layers() - 1).filter_map(|i| net.dense(i).map(|d| (i, d)))
}

fn total_blocks(net: &Network) -> usize {
    net.layers()[1..].iter().map(|l| l.units()).sum()
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| Error::Export {
            path: path.to_path_buf(),
            source,
        })
}

fn with_path(err: Error, path: &Path) -> Error {
    match err {
        Error::Io(source) => Error::Export {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Dense};

    /// [2, 1] network with weights 0.5, -0.25 and bias 1.0.
    fn tiny() -> Network {
        let mut dense = Dense::new(3, 1);
        dense.set_weight(0, 0, 0.5);
        dense.set_weight(1, 0, -0.25);
        dense.set_weight(2, 0, 1.0);
        Network::from_parts(&[2, 1], Activation::Sigmoid, vec![dense]).unwrap()
    }

    #[test]
    fn encodes_twos_complement_fields() {
        let fp = FixedPoint::default();
        assert_eq!(fp.encode(0.5), 0x200);
        assert_eq!(fp.encode(-0.25), 0xf00);
        assert_eq!(fp.encode(0.0), 0x000);
        assert_eq!(fp.encode(1.0), 0x400);
        // round, not truncate: 0.0007 * 1024 = 0.7168
        assert_eq!(fp.encode(0.0007), 0x001);
        assert_eq!(fp.encode(-0.0007), 0xfff);
    }

    #[test]
    fn decode_inverts_encode_within_half_step() {
        let fp = FixedPoint::default();
        for i in -200..=200 {
            let w = i as f64 * 0.00987;
            let back = fp.decode(fp.encode(w));
            assert!((back - w).abs() <= 0.5 / 1024.0 + 1e-12, "w={w} back={back}");
        }
    }

    #[test]
    fn saturate_clamps_and_wrap_misencodes() {
        let sat = FixedPoint::default();
        assert!(!sat.fits(3.0));
        assert_eq!(sat.encode(3.0), 0x7ff);
        assert_eq!(sat.encode(-3.0), 0x800);
        assert_eq!(sat.decode(sat.encode(-3.0)), -2.0);

        let wrap = FixedPoint::new(1024, Overflow::Wrap).unwrap();
        // -3072 keeps only its low 12 bits, which read back as +1.0.
        assert_eq!(wrap.encode(-3.0), 0x400);
        assert_eq!(wrap.decode(wrap.encode(-3.0)), 1.0);
        assert_eq!(wrap.encode(0.5), sat.encode(0.5));

        assert!(FixedPoint::new(0, Overflow::Saturate).is_err());
    }

    #[test]
    fn wrap_truncates_toward_zero() {
        let wrap = FixedPoint::new(1024, Overflow::Wrap).unwrap();
        // (int)(w * 1024), low 12 bits.
        assert_eq!(wrap.encode(-0.0007), 0x000);
        assert_eq!(wrap.encode(0.0007), 0x000);
        assert_eq!(wrap.encode(-0.3004), 0xecd);
        assert_eq!(wrap.encode(0.3004), 0x133);

        let sat = FixedPoint::default();
        assert_eq!(sat.encode(-0.0007), 0xfff);
        assert_eq!(sat.encode(-0.3004), 0xecc);
        assert_eq!(sat.encode(0.3004), 0x134);
    }

    #[test]
    fn firmware_layout() {
        let text = WeightExporter::default().firmware_string(&tiny()).unwrap();
        let expected = "\
// Weights from layer 0 to layer 1
// Weights feeding into layer 1, node 0
weights[0][0][0] = 0.5;
weights[0][0][1] = -0.25;
weights[0][0][2] = 1.0;
";
        assert_eq!(text, expected);
    }

    #[test]
    fn firmware_separates_destination_blocks() {
        let net = Network::new_with_seed(&[2, 2, 2], Activation::Sigmoid, 0).unwrap();
        let text = WeightExporter::default().firmware_string(&net).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.iter().filter(|l| l.starts_with("weights[")).count(), 12);
        assert_eq!(lines.iter().filter(|l| l.is_empty()).count(), 3);
        assert!(!text.ends_with("\n\n"));
        assert!(lines.contains(&"// Weights from layer 1 to layer 2"));
        assert!(lines.contains(&"// Weights feeding into layer 2, node 1"));
    }

    #[test]
    fn memory_image_layout() {
        let text = WeightExporter::default().memory_image_string(&tiny()).unwrap();
        let expected = "\
// Weights from layer 0 to layer 1
// Weights feeding into layer 1, node 0
@0 0x200  // 0.50000
@1 0xf00  // -0.25000
@2 0x400  // 1.00000
";
        assert_eq!(text, expected);
    }

    #[test]
    fn memory_image_counts_every_weight() {
        let net = Network::new_with_seed(&[4, 3, 2], Activation::Sigmoid, 2).unwrap();
        let mut buf = Vec::new();
        let n = WeightExporter::default()
            .write_memory_image(&net, &mut buf)
            .unwrap();
        assert_eq!(n, net.num_weights());
        assert_eq!(n, 5 * 3 + 4 * 2);
    }

    #[test]
    fn parses_target_and_overflow_names() {
        assert_eq!("both".parse::<ExportTarget>().unwrap(), ExportTarget::Both);
        assert_eq!("FPGA".parse::<ExportTarget>().unwrap(), ExportTarget::MemoryImage);
        assert_eq!("memory".parse::<ExportTarget>().unwrap(), ExportTarget::MemoryImage);
        assert_eq!("mcu".parse::<ExportTarget>().unwrap(), ExportTarget::Firmware);
        assert!("disk".parse::<ExportTarget>().is_err());

        assert_eq!("wrap".parse::<Overflow>().unwrap(), Overflow::Wrap);
        assert!("clip".parse::<Overflow>().is_err());
    }

    #[test]
    fn instance_image_renders_integer_parts() {
        let instances = vec![
            Instance::new(vec![1.0, 0.0, 1.0, 1.0], 3),
            Instance::new(vec![0.0, 0.9, 1.2, 0.0], 0),
        ];
        let mut buf = Vec::new();
        let n = write_instance_image(&instances, 4, &mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "@0 10110001\n@1 00101000\n"
        );
    }

    #[test]
    fn instance_image_matches_source_columns() {
        // Features then one-hot label columns, as they appear in the data file.
        let line = "1 0 1 0 0 1 0";
        let instance = crate::data::parse_line(line, 3, 4).unwrap();
        let mut buf = Vec::new();
        write_instance_image(&[instance], 4, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "@0 1010010\n");
    }

    #[test]
    fn instance_image_rejects_label_outside_classes() {
        let instances = vec![Instance::new(vec![1.0], 2)];
        let mut buf = Vec::new();
        assert!(matches!(
            write_instance_image(&instances, 2, &mut buf),
            Err(Error::InvalidData(_))
        ));
    }
}
