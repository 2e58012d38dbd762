use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use image::DynamicImage;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::country::CountryKey;
use crate::remote::{http, FetchFailure};

#[derive(Debug, Error)]
pub enum FlagError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    #[error("unable to decode flag image")]
    Decode(#[from] image::ImageError),
    #[error("flag download did not complete")]
    Lost,
}

#[derive(Debug, Clone)]
pub struct FlagImage {
    image: DynamicImage,
}

impl FlagImage {
    pub fn decode(bytes: &[u8]) -> Result<Self, FlagError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self { image })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Download of one flag PNG, tagged with the country it was started for.
pub struct FlagRequest {
    key: CountryKey,
    receiver: Receiver<Result<FlagImage, FlagError>>,
}

impl FlagRequest {
    pub fn spawn(key: CountryKey, url: String, client: Client) -> Self {
        let (sender, receiver) = mpsc::channel();
        let worker_sender = sender.clone();

        let spawned = thread::Builder::new()
            .name("flag-fetch".to_string())
            .spawn(move || {
                tracing::debug!(%url, "fetching flag image");
                let outcome = http::get_bytes(&client, &url)
                    .map_err(FlagError::from)
                    .and_then(|bytes| FlagImage::decode(&bytes));
                if worker_sender.send(outcome).is_err() {
                    tracing::debug!(%url, "overlay closed before the flag arrived");
                }
            });

        if let Err(err) = spawned {
            tracing::warn!(error = %err, "could not start flag download");
            let _ = sender.send(Err(FlagError::Lost));
        }

        Self { key, receiver }
    }

    /// Request whose outcome is already available.
    #[cfg(test)]
    pub(crate) fn ready(key: CountryKey, outcome: Result<FlagImage, FlagError>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(outcome);
        Self { key, receiver }
    }

    pub fn key(&self) -> CountryKey {
        self.key
    }

    pub fn try_take(&self) -> Option<Result<FlagImage, FlagError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FlagError::Lost)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    use image::{ImageOutputFormat, Rgb, RgbImage};

    pub(crate) fn tiny_png() -> Vec<u8> {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let flag = FlagImage::decode(&tiny_png()).unwrap();
        assert_eq!(flag.image().width(), 4);
        assert_eq!(flag.image().height(), 2);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = FlagImage::decode(b"definitely not a png").unwrap_err();
        assert!(matches!(err, FlagError::Decode(_)));
    }

    #[test]
    fn test_failed_download_reports_error() {
        let client = http::build_client(Duration::from_millis(500)).unwrap();
        let request = FlagRequest::spawn(
            CountryKey(7),
            "http://127.0.0.1:9/w320/uz.png".to_string(),
            client,
        );
        assert_eq!(request.key(), CountryKey(7));

        let deadline = Instant::now() + Duration::from_secs(10);
        let outcome = loop {
            if let Some(outcome) = request.try_take() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "flag request never finished");
            thread::sleep(Duration::from_millis(10));
        };
        assert!(matches!(outcome, Err(FlagError::Fetch(_))));
    }
}
