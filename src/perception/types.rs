use image::DynamicImage;

/// One full-resolution screenshot.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            captured_at: chrono::Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A frame shrunk for the model, encoded as a data URL.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}
