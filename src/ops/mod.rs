pub mod color;
pub mod dialogs;
pub mod hough;
pub mod morphology;

/// Image buffer every action consumes and produces: 3 channels, 8 bits each.
pub type Mat = image::RgbImage;
