use crate::imaging::ImageMetadata;

pub const FALLBACK_HEADING: &str = "BASIC MEDICAL IMAGE ANALYSIS REPORT";

/// Metadata-only report used when no provider answer is available.
/// Nothing in it is derived from the image content.
pub fn fallback_report(metadata: &ImageMetadata) -> String {
    format!(
        "{FALLBACK_HEADING}\n\
         \n\
         Image Properties:\n\
         - Dimensions: {}x{} pixels\n\
         - Color Mode: {}\n\
         - Format: {}\n\
         \n\
         Analysis:\n\
         This is a basic analysis based on image properties only. The AI analysis service \
         was unavailable, so no visual content analysis was performed.\n\
         \n\
         Disclaimer:\n\
         This is a limited analysis based only on image metadata. \
         Always consult a qualified healthcare professional for diagnosis.\n",
        metadata.width, metadata.height, metadata.color_mode, metadata.format
    )
}
