//! Sensors module.
//!
//! Frame sources feeding the frame loop. Frame dimensions are taken from every captured frame, so
//! a source may change its resolution at any time.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;

use crate::config::SourceConfig;

/// Source of video frames.
pub trait CaptureSource: Send {
    /// Capture the current frame.
    fn capture(&mut self) -> Result<RgbImage>;
}

impl<C: CaptureSource + ?Sized> CaptureSource for Box<C> {
    fn capture(&mut self) -> Result<RgbImage> {
        (**self).capture()
    }
}

/// Open the configured frame source.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn CaptureSource>> {
    match config {
        SourceConfig::Stills(path) => Ok(Box::new(StillFrames::open(path)?)),
        #[cfg(feature = "webcam")]
        SourceConfig::Webcam { device, resolution } => {
            Ok(Box::new(Webcam::open(device, *resolution)?))
        }
        #[cfg(not(feature = "webcam"))]
        SourceConfig::Webcam { .. } => {
            bail!("built without webcam support, enable the `webcam` feature or pass --source <dir>")
        }
    }
}

const STILL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays still images in a loop.
pub struct StillFrames {
    frames: Vec<RgbImage>,
    next: usize,
}

impl StillFrames {
    /// Load a single image, or all images of a directory in file name order.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };

        let frames = files
            .iter()
            .map(|file| {
                image::open(file)
                    .map(|img| img.to_rgb8())
                    .with_context(|| format!("failed to load {}", file.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Replaying {} still frames from {}", frames.len(), path.display());
        Self::from_frames(frames)
    }

    pub fn from_frames(frames: Vec<RgbImage>) -> Result<Self> {
        if frames.is_empty() {
            bail!("no frames to replay");
        }
        Ok(Self { frames, next: 0 })
    }
}

impl CaptureSource for StillFrames {
    fn capture(&mut self) -> Result<RgbImage> {
        let frame = self.frames[self.next].clone();
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(feature = "webcam")]
pub use webcam::Webcam;

#[cfg(feature = "webcam")]
mod webcam {
    use anyhow::{anyhow, Context, Result};
    use image::{ImageFormat, RgbImage};
    use rscam::{Camera, Config};

    use super::CaptureSource;

    const FORMAT: &[u8] = b"MJPG";

    /// V4L2 webcam delivering MJPG frames.
    pub struct Webcam {
        cam: Camera,
    }

    impl Webcam {
        /// Open `device_name` at `resolution` with the highest frame rate it supports.
        pub fn open(device_name: &str, resolution: (u32, u32)) -> Result<Self> {
            let mut cam = Camera::new(device_name)
                .with_context(|| format!("failed to open camera {device_name}"))?;
            log_supported_formats(&cam);

            let interval = get_max_frame_rate(&cam, resolution)?;
            log::info!(
                "Using camera {} at {}x{}, interval {}/{}",
                device_name,
                resolution.0,
                resolution.1,
                interval.0,
                interval.1
            );

            cam.start(&Config {
                interval,
                resolution,
                format: FORMAT,
                ..Default::default()
            })?;

            Ok(Self { cam })
        }
    }

    impl CaptureSource for Webcam {
        fn capture(&mut self) -> Result<RgbImage> {
            let frame = self.cam.capture().context("failed to capture frame")?;
            let image = image::load_from_memory_with_format(&frame[..], ImageFormat::Jpeg)
                .context("failed to decode MJPG frame")?;
            Ok(image.to_rgb8())
        }
    }

    /// Get the maximum supported frame rate for the given resolution.
    fn get_max_frame_rate(cam: &Camera, resolution: (u32, u32)) -> Result<(u32, u32)> {
        let interval_info = cam.intervals(FORMAT, resolution)?;
        log::debug!("Found frame rates: {:?}", &interval_info);
        match interval_info {
            rscam::IntervalInfo::Discretes(frame_rates) => frame_rates
                .iter()
                // Highest frames per second means smallest interval numerator/denominator
                .max_by(|a, b| (a.1 * b.0).cmp(&(b.1 * a.0)))
                .copied(),
            rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
        }
        .ok_or_else(|| anyhow!("No frame rate found"))
    }

    fn log_supported_formats(cam: &Camera) {
        let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
        log::debug!("Supported formats: {:?}, using format MJPG", formats);
    }
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    #[test]
    fn test_still_frames_cycle() -> Result<()> {
        let frames = vec![
            RgbImage::from_pixel(4, 2, Rgb([1, 0, 0])),
            RgbImage::from_pixel(8, 6, Rgb([2, 0, 0])),
        ];
        let mut source = StillFrames::from_frames(frames)?;

        assert_eq!(source.capture()?.dimensions(), (4, 2));
        assert_eq!(source.capture()?.dimensions(), (8, 6));
        assert_eq!(source.capture()?.dimensions(), (4, 2));

        Ok(())
    }

    #[test]
    fn test_empty_is_error() {
        assert!(StillFrames::from_frames(Vec::new()).is_err());
    }

    #[test]
    fn test_load_directory_sorted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::new(3, 3).save(dir.path().join("b.png"))?;
        RgbImage::new(5, 5).save(dir.path().join("a.png"))?;
        std::fs::write(dir.path().join("notes.txt"), "not an image")?;

        let mut source = StillFrames::open(dir.path())?;
        assert_eq!(source.capture()?.dimensions(), (5, 5));
        assert_eq!(source.capture()?.dimensions(), (3, 3));
        assert_eq!(source.capture()?.dimensions(), (5, 5));

        Ok(())
    }

    #[test]
    fn test_open_source_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("frame.jpg");
        RgbImage::new(12, 7).save(&file)?;

        let mut source = open_source(&SourceConfig::Stills(file))?;
        assert_eq!(source.capture()?.dimensions(), (12, 7));

        Ok(())
    }

    #[test]
    fn test_empty_directory_is_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(StillFrames::open(dir.path()).is_err());

        Ok(())
    }
}
