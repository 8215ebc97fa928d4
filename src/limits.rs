use crate::error::DngError;

/// Resource limits for decode operations.
///
/// All fields default to `None` (no limit). Limits apply per image, before
/// any pixel buffer for that image is allocated.
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height).
    pub max_pixels: Option<u64>,
    /// Maximum memory bytes for one decoded image buffer.
    pub max_memory_bytes: Option<u64>,
    /// Maximum number of IFDs visited while walking the container.
    pub max_ifds: Option<u32>,
}

impl Limits {
    /// Check dimensions against limits. Returns Ok(()) or LimitExceeded error.
    pub(crate) fn check(&self, width: u32, height: u32) -> Result<(), DngError> {
        if let Some(max_w) = self.max_width {
            if u64::from(width) > max_w {
                return Err(DngError::LimitExceeded(alloc::format!(
                    "width {width} exceeds limit {max_w}"
                )));
            }
        }
        if let Some(max_h) = self.max_height {
            if u64::from(height) > max_h {
                return Err(DngError::LimitExceeded(alloc::format!(
                    "height {height} exceeds limit {max_h}"
                )));
            }
        }
        if let Some(max_px) = self.max_pixels {
            let pixels = u64::from(width) * u64::from(height);
            if pixels > max_px {
                return Err(DngError::LimitExceeded(alloc::format!(
                    "pixel count {pixels} exceeds limit {max_px}"
                )));
            }
        }
        Ok(())
    }

    /// Check that an allocation size is within memory limits.
    pub(crate) fn check_memory(&self, bytes: usize) -> Result<(), DngError> {
        if let Some(max_mem) = self.max_memory_bytes {
            if bytes as u64 > max_mem {
                return Err(DngError::LimitExceeded(alloc::format!(
                    "allocation {bytes} bytes exceeds memory limit {max_mem}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn ifd_budget(&self) -> u32 {
        self.max_ifds.unwrap_or(DEFAULT_MAX_IFDS)
    }
}

pub(crate) const DEFAULT_MAX_IFDS: u32 = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_by_default() {
        let limits = Limits::default();
        assert!(limits.check(u32::MAX, u32::MAX).is_ok());
        assert!(limits.check_memory(usize::MAX).is_ok());
        assert_eq!(limits.ifd_budget(), DEFAULT_MAX_IFDS);
    }

    #[test]
    fn rejects_oversized() {
        let limits = Limits {
            max_width: Some(100),
            max_pixels: Some(50 * 50),
            max_memory_bytes: Some(1000),
            ..Default::default()
        };
        assert!(limits.check(100, 10).is_ok());
        assert!(matches!(
            limits.check(101, 1),
            Err(DngError::LimitExceeded(_))
        ));
        assert!(matches!(
            limits.check(60, 60),
            Err(DngError::LimitExceeded(_))
        ));
        assert!(matches!(
            limits.check_memory(1001),
            Err(DngError::LimitExceeded(_))
        ));
    }
}
