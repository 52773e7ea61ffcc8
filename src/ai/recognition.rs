use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{delimited_span, AiClient, AiError, ChatMessage, ChatRequest, ModelTier};

/// Longest edge of the image forwarded to the model.
pub const MAX_IMAGE_EDGE: u32 = 1024;
const JPEG_QUALITY: u8 = 85;
const FALLBACK_CONFIDENCE: f64 = 0.7;
const MIN_NAME_LEN: usize = 3;

const RECOGNITION_PROMPT: &str = "Identify all the food ingredients visible in this image. \
List them as a JSON array of objects with 'name' and 'confidence' fields. \
Only include items you can clearly identify as food ingredients. \
Example: [{\"name\": \"tomato\", \"confidence\": 0.9}, {\"name\": \"onion\", \"confidence\": 0.85}]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedIngredient {
    pub name: String,
    #[serde(default = "fallback_confidence")]
    pub confidence: f64,
}

fn fallback_confidence() -> f64 {
    FALLBACK_CONFIDENCE
}

/// Decodes any supported raster format and re-encodes it as a JPEG that
/// fits inside a `MAX_IMAGE_EDGE` square. Smaller images are not enlarged.
pub fn normalize_image(bytes: &[u8]) -> image::ImageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = decoded.dimensions();
    let fitted = if width > MAX_IMAGE_EDGE || height > MAX_IMAGE_EDGE {
        decoded.resize(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut out, ImageOutputFormat::Jpeg(JPEG_QUALITY))?;
    Ok(out)
}

/// Sends an already normalized JPEG to the vision model.
#[instrument(skip(ai, jpeg), fields(size = jpeg.len()))]
pub async fn recognize_ingredients(
    ai: &dyn AiClient,
    jpeg: &[u8],
) -> Result<Vec<RecognizedIngredient>, AiError> {
    let data_url = format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg));
    let mut request = ChatRequest::new(
        ModelTier::Vision,
        vec![ChatMessage::user_with_image(RECOGNITION_PROMPT, data_url)],
    );
    request.max_tokens = Some(500);

    let text = ai.complete(request).await?;
    let ingredients = parse_recognition(&text)?;
    debug!(count = ingredients.len(), "ingredients recognized");
    Ok(ingredients)
}

/// Reads the model's answer. A bracketed span must be a JSON array; prose
/// answers are read line by line instead.
pub fn parse_recognition(text: &str) -> Result<Vec<RecognizedIngredient>, AiError> {
    if let Some(span) = delimited_span(text, '[', ']') {
        let items: Vec<RecognizedIngredient> =
            serde_json::from_str(span).map_err(|e| AiError::UnreadableIngredients(e.to_string()))?;
        return Ok(items
            .into_iter()
            .map(|i| RecognizedIngredient {
                name: i.name.trim().to_lowercase(),
                confidence: i.confidence.clamp(0.0, 1.0),
            })
            .filter(|i| !i.name.is_empty())
            .collect());
    }

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains('{') && !line.contains('['))
        .map(clean_line)
        .filter(|name| name.chars().count() >= MIN_NAME_LEN)
        .map(|name| RecognizedIngredient {
            name,
            confidence: FALLBACK_CONFIDENCE,
        })
        .collect())
}

fn clean_line(line: &str) -> String {
    let stripped: String = line
        .chars()
        .filter(|c| !c.is_ascii_digit() && !(c.is_ascii_punctuation() && *c != '\'') && *c != '•')
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    #[test]
    fn parses_json_array_inside_prose() {
        let text = "Here you go:\n[{\"name\": \"Tomato\", \"confidence\": 0.9}, {\"name\": \"onion\"}]";
        let items = parse_recognition(text).unwrap();
        assert_eq!(
            items,
            vec![
                RecognizedIngredient { name: "tomato".into(), confidence: 0.9 },
                RecognizedIngredient { name: "onion".into(), confidence: 0.7 },
            ]
        );
    }

    #[test]
    fn falls_back_to_lines_when_no_array() {
        let text = "1. Tomatoes\n2. Red onion\n- eg\n\n3. Basil.";
        let items = parse_recognition(text).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["tomatoes", "red onion", "basil"]);
        assert!(items.iter().all(|i| i.confidence == 0.7));
    }

    #[test]
    fn broken_array_is_a_parse_error() {
        let err = parse_recognition("[{\"name\": \"tomato\",]").unwrap_err();
        assert!(matches!(err, AiError::UnreadableIngredients(_)));
    }

    #[test]
    fn normalize_shrinks_large_images_and_keeps_small_ones() {
        let large = ImageBuffer::from_pixel(2048, 1024, Rgba([200u8, 10, 10, 255]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(large)
            .write_to(&mut png, ImageOutputFormat::Png)
            .unwrap();

        let jpeg = normalize_image(&png).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(out.dimensions(), (1024, 512));

        let small = ImageBuffer::from_pixel(64, 32, Rgba([0u8, 0, 0, 255]));
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(small)
            .write_to(&mut png, ImageOutputFormat::Png)
            .unwrap();
        let out = image::load_from_memory(&normalize_image(&png).unwrap()).unwrap();
        assert_eq!(out.dimensions(), (64, 32));
    }

    #[test]
    fn normalize_rejects_non_images() {
        assert!(normalize_image(b"definitely not an image").is_err());
    }
}
