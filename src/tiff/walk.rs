use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::tags;
use super::{ByteOrder, Ifd, parse_header};
use crate::error::{DngError, warn};
use crate::limits::Limits;

/// SubIFD nesting deeper than this is ignored.
const MAX_SUB_IFD_DEPTH: u32 = 8;

/// All directories of a TIFF file, in load order.
#[derive(Debug)]
pub(crate) struct Container<'a> {
    pub order: ByteOrder,
    pub is_cr2: bool,
    /// Image IFDs: IFD0, its SubIFDs (depth-first), then the next chained IFD.
    pub images: Vec<Ifd<'a>>,
    /// The first EXIF IFD referenced by an image IFD.
    pub exif: Option<Ifd<'a>>,
}

struct Walker<'a, 'w> {
    data: &'a [u8],
    order: ByteOrder,
    visited: BTreeSet<u32>,
    budget: u32,
    images: Vec<Ifd<'a>>,
    exif: Option<Ifd<'a>>,
    warnings: &'w mut Vec<String>,
}

/// Parse the header and every reachable IFD.
///
/// The first IFD must parse. Failures further down the chain or in
/// SubIFDs end that branch with a warning.
pub(crate) fn parse_container<'a>(
    data: &'a [u8],
    limits: Option<&Limits>,
    warnings: &mut Vec<String>,
) -> Result<Container<'a>, DngError> {
    let header = parse_header(data)?;
    log::debug!(
        "TIFF header: {:?} order, first IFD at {}{}",
        header.order,
        header.first_ifd,
        if header.is_cr2 { ", CR2" } else { "" }
    );

    let mut walker = Walker {
        data,
        order: header.order,
        visited: BTreeSet::new(),
        budget: limits.map_or(crate::limits::DEFAULT_MAX_IFDS, Limits::ifd_budget),
        images: Vec::new(),
        exif: None,
        warnings,
    };

    let mut next = header.first_ifd;
    let mut index = 0usize;
    while next != 0 {
        let ifd = match walker.visit(next)? {
            Some(ifd) => ifd,
            None => break,
        };
        let ifd = match ifd {
            Ok(ifd) => ifd,
            Err(e) if index == 0 => return Err(e),
            Err(e) => {
                warn(
                    walker.warnings,
                    format!("IFD #{index} at offset {next}: {e}; stopping IFD chain"),
                );
                break;
            }
        };
        next = ifd.next;
        index += 1;
        walker.push_image(ifd, 0)?;
    }

    Ok(Container {
        order: header.order,
        is_cr2: header.is_cr2,
        images: walker.images,
        exif: walker.exif,
    })
}

impl<'a> Walker<'a, '_> {
    /// Parse the IFD at `offset` unless it was already seen or the budget
    /// is spent. The outer `Err` is reserved for budget exhaustion.
    fn visit(&mut self, offset: u32) -> Result<Option<Result<Ifd<'a>, DngError>>, DngError> {
        if !self.visited.insert(offset) {
            warn(
                self.warnings,
                format!("IFD at offset {offset} was already visited; cycle ignored"),
            );
            return Ok(None);
        }
        if self.budget == 0 {
            return Err(DngError::LimitExceeded(format!(
                "more than {} IFDs",
                self.visited.len() - 1
            )));
        }
        self.budget -= 1;
        Ok(Some(Ifd::parse(self.data, self.order, offset, self.warnings)))
    }

    fn push_image(&mut self, ifd: Ifd<'a>, depth: u32) -> Result<(), DngError> {
        let low: Vec<u16> = ifd
            .entries
            .iter()
            .map(|e| e.tag)
            .filter(|&t| {
                t < tags::FIRST_IMAGE_TAG
                    && !tags::ALT_WIDTH.contains(&t)
                    && !tags::ALT_HEIGHT.contains(&t)
            })
            .collect();
        if !low.is_empty() {
            warn(
                self.warnings,
                format!(
                    "IFD at offset {} uses unexpected tags below {}: {low:?}",
                    ifd.offset,
                    tags::FIRST_IMAGE_TAG
                ),
            );
        }

        let sub_ifds = ifd
            .get(tags::SUB_IFDS)
            .map(|e| e.u32_values())
            .unwrap_or_default();
        let exif_offset = ifd.u32(tags::EXIF_IFD);
        log::debug!(
            "image IFD #{} at offset {} ({} entries, {} SubIFDs, depth {depth})",
            self.images.len(),
            ifd.offset,
            ifd.entries.len(),
            sub_ifds.len()
        );
        self.images.push(ifd);

        if let Some(offset) = exif_offset {
            self.parse_exif(offset)?;
        }

        if sub_ifds.is_empty() {
            return Ok(());
        }
        if depth + 1 > MAX_SUB_IFD_DEPTH {
            warn(
                self.warnings,
                format!("SubIFDs nested deeper than {MAX_SUB_IFD_DEPTH}; ignored"),
            );
            return Ok(());
        }
        for offset in sub_ifds {
            match self.visit(offset)? {
                Some(Ok(sub)) => self.push_image(sub, depth + 1)?,
                Some(Err(e)) => warn(
                    self.warnings,
                    format!("SubIFD at offset {offset}: {e}; skipped"),
                ),
                None => {}
            }
        }
        Ok(())
    }

    fn parse_exif(&mut self, offset: u32) -> Result<(), DngError> {
        if self.exif.is_some() || offset == 0 {
            return Ok(());
        }
        match self.visit(offset)? {
            Some(Ok(exif)) => {
                log::debug!("EXIF IFD at offset {offset}: {} entries", exif.entries.len());
                self.exif = Some(exif);
            }
            Some(Err(e)) => warn(
                self.warnings,
                format!("EXIF IFD at offset {offset}: {e}; skipped"),
            ),
            None => {}
        }
        Ok(())
    }
}
