//! Serializers for the BVH file and the blendshape stream, plus a reader for
//! the BVH `MOTION` section.
//!
//! Every float is written with six decimals so regenerated files diff
//! cleanly.

use std::io::Write;

use glam::DVec3;
use serde::Serialize;

use crate::blendshape::{unit_names, BlendshapeVector};
use crate::motion::MotionTable;
use crate::skeleton::Skeleton;
use crate::{MocapError, Result};

/// Blendshape stream encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendshapeFormat {
    #[default]
    Csv,
    Json,
}

/// Formats `value` with six decimals. Negative values that round to zero are
/// written without the sign.
pub fn format_float(value: f64) -> String {
    let text = format!("{value:.6}");
    match text.strip_prefix('-') {
        Some(digits) if digits.bytes().all(|b| b == b'0' || b == b'.') => digits.to_string(),
        _ => text,
    }
}

fn format_vec(v: DVec3) -> String {
    format!("{} {} {}", format_float(v.x), format_float(v.y), format_float(v.z))
}

/// Writes `table` as BVH using `skeleton` for the hierarchy.
pub fn write_bvh<W: Write>(mut out: W, skeleton: &Skeleton, table: &MotionTable) -> Result<()> {
    if table.channel_count() != skeleton.channel_count() {
        return Err(MocapError::ChannelArityMismatch {
            frame: 0,
            expected: skeleton.channel_count(),
            found: table.channel_count(),
        });
    }

    writeln!(out, "HIERARCHY")?;
    write_joint(&mut out, skeleton, 0)?;

    writeln!(out, "MOTION")?;
    writeln!(out, "Frames: {}", table.frame_count())?;
    writeln!(out, "Frame Time: {}", format_float(table.frame_time()))?;
    for row in table.channel_rows() {
        let line: Vec<String> = row.iter().copied().map(format_float).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

fn write_joint<W: Write>(out: &mut W, skeleton: &Skeleton, index: usize) -> Result<()> {
    let joint = &skeleton.joint_list()[index];
    let indent = "\t".repeat(joint.depth);
    let keyword = if joint.parent.is_none() { "ROOT" } else { "JOINT" };

    writeln!(out, "{indent}{keyword} {}", joint.name)?;
    writeln!(out, "{indent}{{")?;
    writeln!(out, "{indent}\tOFFSET {}", format_vec(joint.offset))?;
    let channels: Vec<&str> = joint.channels.iter().map(|c| c.as_str()).collect();
    writeln!(
        out,
        "{indent}\tCHANNELS {} {}",
        channels.len(),
        channels.join(" ")
    )?;

    let children = skeleton.children(index);
    for &child in children {
        write_joint(out, skeleton, child)?;
    }
    // Leaf joints always close with an end site so readers can size the bone.
    if joint.end_site.is_some() || children.is_empty() {
        writeln!(out, "{indent}\tEnd Site")?;
        writeln!(out, "{indent}\t{{")?;
        writeln!(
            out,
            "{indent}\t\tOFFSET {}",
            format_vec(joint.end_site.unwrap_or(DVec3::ZERO))
        )?;
        writeln!(out, "{indent}\t}}")?;
    }

    writeln!(out, "{indent}}}")?;
    Ok(())
}

/// Renders the BVH file into a string.
pub fn bvh_string(skeleton: &Skeleton, table: &MotionTable) -> Result<String> {
    let mut buffer = Vec::new();
    write_bvh(&mut buffer, skeleton, table)?;
    String::from_utf8(buffer).map_err(|err| MocapError::msg(err.to_string()))
}

/// Writes one CSV row per frame: `frame,time,<unit weights...>`.
pub fn write_blendshape_csv<W: Write>(mut out: W, table: &MotionTable) -> Result<()> {
    let header: Vec<&str> = ["frame", "time"].into_iter().chain(unit_names()).collect();
    writeln!(out, "{}", header.join(","))?;

    for (index, frame) in table.frames().iter().enumerate() {
        let mut fields = vec![
            index.to_string(),
            format_float(index as f64 * table.frame_time()),
        ];
        fields.extend(frame.blendshapes.weights().iter().copied().map(format_float));
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct BlendshapeTrack<'a> {
    fps: f64,
    frame_time: f64,
    units: Vec<&'static str>,
    frames: Vec<RoundedWeights<'a>>,
}

struct RoundedWeights<'a>(&'a BlendshapeVector);

impl Serialize for RoundedWeights<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.weights().iter().map(|w| round6(*w)))
    }
}

fn round6(value: f64) -> f64 {
    let rounded = (value * 1e6).round() / 1e6;
    // Drops the sign of -0.0.
    rounded + 0.0
}

/// Writes the blendshape stream as a JSON document.
pub fn write_blendshape_json<W: Write>(out: W, table: &MotionTable) -> Result<()> {
    let track = BlendshapeTrack {
        fps: table.fps(),
        frame_time: round6(table.frame_time()),
        units: unit_names().collect(),
        frames: table
            .frames()
            .iter()
            .map(|frame| RoundedWeights(&frame.blendshapes))
            .collect(),
    };
    serde_json::to_writer_pretty(out, &track)?;
    Ok(())
}

/// Renders the blendshape stream into a string in `format`.
pub fn blendshape_string(table: &MotionTable, format: BlendshapeFormat) -> Result<String> {
    let mut buffer = Vec::new();
    match format {
        BlendshapeFormat::Csv => write_blendshape_csv(&mut buffer, table)?,
        BlendshapeFormat::Json => write_blendshape_json(&mut buffer, table)?,
    }
    String::from_utf8(buffer).map_err(|err| MocapError::msg(err.to_string()))
}

/// Motion data read back from a BVH file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMotion {
    /// Sum of the hierarchy's `CHANNELS` declarations.
    pub channel_count: usize,
    pub frame_time: f64,
    pub rows: Vec<Vec<f64>>,
}

impl ParsedMotion {
    pub fn frame_count(&self) -> usize {
        self.rows.len()
    }
}

/// Parses the `MOTION` section of a BVH document and checks it against the
/// hierarchy's channel declarations.
pub fn parse_motion(text: &str) -> Result<ParsedMotion> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    let mut channel_count = 0;
    let mut found_motion = false;
    for line in lines.by_ref() {
        if line == "MOTION" {
            found_motion = true;
            break;
        }
        if let Some(rest) = line.strip_prefix("CHANNELS") {
            let count = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| MocapError::msg(format!("bad CHANNELS line `{line}`")))?;
            channel_count += count;
        }
    }
    if !found_motion {
        return Err(MocapError::msg("missing MOTION section"));
    }

    let frame_count: usize = header_value(lines.next(), "Frames:")?;
    let frame_time: f64 = header_value(lines.next(), "Frame Time:")?;

    let mut rows = Vec::with_capacity(frame_count);
    for (index, line) in lines.enumerate() {
        let row = line
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| MocapError::msg(format!("motion row {index}: {err}")))?;
        if channel_count > 0 && row.len() != channel_count {
            return Err(MocapError::msg(format!(
                "motion row {index} has {} values, expected {channel_count}",
                row.len()
            )));
        }
        rows.push(row);
    }

    if rows.len() != frame_count {
        return Err(MocapError::msg(format!(
            "header declares {frame_count} frames, found {}",
            rows.len()
        )));
    }

    Ok(ParsedMotion {
        channel_count,
        frame_time,
        rows,
    })
}

fn header_value<T: std::str::FromStr>(line: Option<&str>, key: &str) -> Result<T> {
    line.and_then(|line| line.strip_prefix(key))
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| MocapError::msg(format!("missing or invalid `{key}` line")))
}
