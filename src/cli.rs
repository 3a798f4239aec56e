use crate::adaptive::{self, AdaptiveConfig};
use crate::codec::Image;
use crate::crypto::CryptographicEngine;
use crate::error::Result;
use crate::metrics;
use crate::simple_lsb::{self, SimpleLsbConfig};
use crate::steganalysis;
use clap::{Parser, Subcommand};
use image::{ImageBuffer, Luma};
use std::path::Path;

/// Command-line interface for the steganography tool
#[derive(Parser)]
#[command(name = "imgstego")]
#[command(about = "Edge-adaptive image steganography, quality metrics, and steganalysis")]
#[command(version = "1.0.0")]
pub struct CommandLineInterface {
    #[command(subcommand)]
    pub command: SteganographyCommand,
}

/// Available steganography commands
#[derive(Subcommand)]
pub enum SteganographyCommand {
    /// Hide encrypted data in an image using the edge/region-adaptive embedder
    Encode {
        #[arg(short, long, help = "Path to the cover image file")]
        input: String,

        #[arg(short, long, help = "Output path for the stego PNG")]
        output: String,

        #[arg(short, long, help = "Secret message to hide in the image")]
        data: String,

        #[arg(short, long, help = "Path to encryption key file (generated if not provided)")]
        key_file: Option<String>,

        #[arg(long, default_value = "8", help = "Block size, must be even")]
        block_size: u32,

        #[arg(long, default_value = "30.0", help = "Edge score threshold for block eligibility")]
        edge_threshold: f64,
    },

    /// Extract and decrypt data hidden by `encode`
    Decode {
        #[arg(short, long, help = "Path to the stego image")]
        input: String,

        #[arg(short, long, help = "Encryption key file path or base64 key string")]
        key: String,

        #[arg(long, default_value = "8", help = "Block size used at encode time")]
        block_size: u32,

        #[arg(long, default_value = "30.0", help = "Edge score threshold used at encode time")]
        edge_threshold: f64,
    },

    /// Hide encrypted data using the simple 3-pixels-per-character LSB baseline
    SimpleEncode {
        #[arg(short, long, help = "Path to the cover image file")]
        input: String,

        #[arg(short, long, help = "Output path for the stego PNG")]
        output: String,

        #[arg(short, long, help = "Secret message to hide in the image")]
        data: String,

        #[arg(short, long, help = "Path to encryption key file (generated if not provided)")]
        key_file: Option<String>,

        #[arg(long, help = "Restrict embedding to smooth (low-gradient) regions")]
        edge_adaptive: bool,
    },

    /// Extract and decrypt data hidden by `simple-encode`
    SimpleDecode {
        #[arg(short, long, help = "Path to the stego image")]
        input: String,

        #[arg(short, long, help = "Encryption key file path or base64 key string")]
        key: String,

        #[arg(long, help = "Must match the --edge-adaptive flag used at encode time")]
        edge_adaptive: bool,
    },

    /// Compute image-quality metrics between a cover and its stego counterpart
    Metrics {
        #[arg(short, long, help = "Path to the original cover image")]
        original: String,

        #[arg(short, long, help = "Path to the stego image")]
        stego: String,
    },

    /// Run RS analysis, histogram analysis, and the chi-square pairs-of-values attack
    Steganalysis {
        #[arg(short, long, help = "Path to the original cover image")]
        cover: String,

        #[arg(short, long, help = "Path to the stego image")]
        stego: String,

        #[arg(long, default_value = "2", help = "RS analysis pixel group size")]
        mask_size: usize,
    },

    /// Generate a self-contained demonstration: synthesize a cover, hide a message,
    /// recover it, and print the quality metrics
    Demo,
}

/// Command-line interface handler
pub struct CommandLineHandler {
    cryptographic_engine: CryptographicEngine,
}

impl CommandLineHandler {
    pub fn new() -> Self {
        Self {
            cryptographic_engine: CryptographicEngine::new(),
        }
    }

    pub fn process_command(&mut self, cli: CommandLineInterface) -> Result<()> {
        match cli.command {
            SteganographyCommand::Encode {
                input,
                output,
                data,
                key_file,
                block_size,
                edge_threshold,
            } => self.handle_encode_command(input, output, data, key_file, block_size, edge_threshold),

            SteganographyCommand::Decode {
                input,
                key,
                block_size,
                edge_threshold,
            } => self.handle_decode_command(input, key, block_size, edge_threshold),

            SteganographyCommand::SimpleEncode {
                input,
                output,
                data,
                key_file,
                edge_adaptive,
            } => self.handle_simple_encode_command(input, output, data, key_file, edge_adaptive),

            SteganographyCommand::SimpleDecode {
                input,
                key,
                edge_adaptive,
            } => self.handle_simple_decode_command(input, key, edge_adaptive),

            SteganographyCommand::Metrics { original, stego } => {
                self.handle_metrics_command(original, stego)
            }

            SteganographyCommand::Steganalysis {
                cover,
                stego,
                mask_size,
            } => self.handle_steganalysis_command(cover, stego, mask_size),

            SteganographyCommand::Demo => self.handle_demo_command(),
        }
    }

    fn handle_encode_command(
        &mut self,
        input_path: String,
        output_path: String,
        secret_data: String,
        key_file_path: Option<String>,
        block_size: u32,
        edge_threshold: f64,
    ) -> Result<()> {
        let config = AdaptiveConfig::new(block_size, edge_threshold)?;

        let cover = Image::load(&input_path)?;
        println!("Loaded cover image: {}x{} pixels", cover.width(), cover.height());

        let encryption_key = self.get_or_generate_encryption_key(&output_path, key_file_path)?;
        let ciphertext = self.cryptographic_engine.encrypt(&encryption_key, secret_data.as_bytes())?;
        println!("Encrypted {} bytes of data to {} bytes", secret_data.len(), ciphertext.len());

        let (stego, metadata) = adaptive::encode(&cover, &ciphertext, &config)?;

        let output_file_path = normalize_png_path(&output_path);
        stego.save(&output_file_path)?;

        println!("Stego image saved to: {}", output_file_path);
        println!(
            "Embedded {} of {} bits across {} blocks ({:.4} bpp)",
            metadata.embedded_bits, metadata.payload_bits, metadata.blocks_used, metadata.capacity_bpp
        );

        Ok(())
    }

    fn handle_decode_command(
        &mut self,
        input_path: String,
        key_input: String,
        block_size: u32,
        edge_threshold: f64,
    ) -> Result<()> {
        let config = AdaptiveConfig::new(block_size, edge_threshold)?;

        let stego = Image::load(&input_path)?;
        println!("Loaded stego image: {}x{} pixels", stego.width(), stego.height());

        let encryption_key = self.cryptographic_engine.load_key_from_input(&key_input)?;
        let ciphertext = adaptive::decode(&stego, &config)?;
        println!("Extracted {} bytes of encrypted data", ciphertext.len());

        let plaintext = self.cryptographic_engine.decrypt(&encryption_key, &ciphertext)?;
        let secret_message = String::from_utf8(plaintext)?;

        println!("Recovered secret message:");
        println!("\"{}\"", secret_message);

        Ok(())
    }

    fn handle_simple_encode_command(
        &mut self,
        input_path: String,
        output_path: String,
        secret_data: String,
        key_file_path: Option<String>,
        edge_adaptive: bool,
    ) -> Result<()> {
        let cover = Image::load(&input_path)?;
        println!("Loaded cover image: {}x{} pixels", cover.width(), cover.height());

        let encryption_key = self.get_or_generate_encryption_key(&output_path, key_file_path)?;
        let ciphertext = self.cryptographic_engine.encrypt(&encryption_key, secret_data.as_bytes())?;
        println!("Encrypted {} bytes of data to {} bytes", secret_data.len(), ciphertext.len());

        let config = SimpleLsbConfig { edge_adaptive };
        let stego = simple_lsb::encode_with_config(&cover, &ciphertext, config)?;

        let output_file_path = normalize_png_path(&output_path);
        stego.save(&output_file_path)?;
        println!("Stego image saved to: {}", output_file_path);

        Ok(())
    }

    fn handle_simple_decode_command(
        &mut self,
        input_path: String,
        key_input: String,
        edge_adaptive: bool,
    ) -> Result<()> {
        let stego = Image::load(&input_path)?;
        println!("Loaded stego image: {}x{} pixels", stego.width(), stego.height());

        let encryption_key = self.cryptographic_engine.load_key_from_input(&key_input)?;
        let config = SimpleLsbConfig { edge_adaptive };
        let ciphertext = simple_lsb::decode_with_config(&stego, config)?;
        println!("Extracted {} bytes of encrypted data", ciphertext.len());

        let plaintext = self.cryptographic_engine.decrypt(&encryption_key, &ciphertext)?;
        let secret_message = String::from_utf8(plaintext)?;

        println!("Recovered secret message:");
        println!("\"{}\"", secret_message);

        Ok(())
    }

    fn handle_metrics_command(&mut self, original_path: String, stego_path: String) -> Result<()> {
        let original = Image::load(&original_path)?;
        let stego = Image::load(&stego_path)?;

        let evaluation = metrics::evaluate(&original, &stego, None)?;

        println!("{:-^60}", " IMAGE QUALITY METRICS ");
        println!("MSE:                  {:.4}", evaluation.mse);
        if evaluation.psnr.is_infinite() {
            println!("PSNR:                 inf dB (identical images)");
        } else {
            println!("PSNR:                 {:.2} dB", evaluation.psnr);
        }
        println!("Entropy (original):   {:.4} bits", evaluation.entropy_original);
        println!("Entropy (stego):      {:.4} bits", evaluation.entropy_stego);
        println!("Entropy difference:   {:.4} bits", evaluation.entropy_difference);
        println!("Histogram chi-square: {:.6}", evaluation.histogram_chi_square);
        println!("{:-<60}", "");

        if evaluation.psnr > 40.0 {
            println!("PSNR: excellent quality (>40 dB), imperceptible changes");
        } else if evaluation.psnr > 30.0 {
            println!("PSNR: good quality (30-40 dB), minimal visible changes");
        } else {
            println!("PSNR: fair quality (<30 dB), changes may be noticeable");
        }

        Ok(())
    }

    fn handle_steganalysis_command(&mut self, cover_path: String, stego_path: String, mask_size: usize) -> Result<()> {
        let cover = Image::load(&cover_path)?.to_gray();
        let stego = Image::load(&stego_path)?.to_gray();

        println!("{:-^60}", " STEGANALYSIS ");

        let rs_cover = steganalysis::analyze_rs(&cover, mask_size);
        let rs_stego = steganalysis::analyze_rs(&stego, mask_size);
        println!("[RS analysis]");
        println!("  cover embedding rate estimate: {:.4}", rs_cover.embedding_rate_estimate);
        println!("  stego embedding rate estimate: {:.4}", rs_stego.embedding_rate_estimate);
        println!("  stego detected: {}", rs_stego.stego_detected);

        let histogram = steganalysis::analyze_histograms(&cover, &stego);
        println!("[Histogram analysis]");
        println!("  chi-square distance: {:.6}", histogram.chi_square);
        println!("  KS statistic:        {:.6}", histogram.ks_statistic);
        println!("  Bhattacharyya distance: {:.6}", histogram.bhattacharyya);
        println!("  detectable:          {}", histogram.detectable);

        let chi_cover = steganalysis::chi_square_pairs_of_values(&cover, None);
        let chi_stego = steganalysis::chi_square_pairs_of_values(&stego, None);
        println!("[Chi-square pairs-of-values attack]");
        println!("  cover chi-square: {:.2}", chi_cover.chi_square_statistic);
        println!("  stego chi-square: {:.2}", chi_stego.chi_square_statistic);
        println!("  stego detected:   {}", chi_stego.stego_detected);

        let detections = [rs_stego.stego_detected, histogram.detectable, chi_stego.stego_detected]
            .iter()
            .filter(|&&d| d)
            .count();
        println!("{:-<60}", "");
        println!("Overall detection rate: {}/3 attacks flagged the stego image", detections);

        Ok(())
    }

    fn handle_demo_command(&mut self) -> Result<()> {
        println!("Creating demonstration...");

        const IMAGE_WIDTH: u32 = 128;
        const IMAGE_HEIGHT: u32 = 128;
        let test_image: image::GrayImage = ImageBuffer::from_fn(IMAGE_WIDTH, IMAGE_HEIGHT, |x, y| {
            Luma([(((x * 5) ^ (y * 3)) % 256) as u8])
        });
        let cover = Image::Gray(test_image);
        cover.save("demo_cover_image.png")?;
        println!("Created synthetic cover image: demo_cover_image.png");

        let demo_message = "Secret message hidden with edge-adaptive steganography!";
        let encryption_key = CryptographicEngine::generate_encryption_key();
        let ciphertext = self
            .cryptographic_engine
            .encrypt(&encryption_key, demo_message.as_bytes())?;

        let config = AdaptiveConfig::default();
        let (stego, metadata) = adaptive::encode(&cover, &ciphertext, &config)?;
        stego.save("demo_stego_image.png")?;

        let recovered_ciphertext = adaptive::decode(&stego, &config)?;
        let recovered_plaintext = self
            .cryptographic_engine
            .decrypt(&encryption_key, &recovered_ciphertext)?;
        let recovered_message = String::from_utf8(recovered_plaintext)?;

        self.cryptographic_engine
            .save_key_to_file(&encryption_key, "demo_encryption.key")?;

        let evaluation = metrics::evaluate(&cover, &stego, Some(metadata.payload_bits))?;

        println!("\n=== DEMONSTRATION RESULTS ===");
        println!("Original message:  \"{}\"", demo_message);
        println!("Recovered message: \"{}\"", recovered_message);
        println!("Success: {}", demo_message == recovered_message);
        println!("PSNR: {:.2} dB", evaluation.psnr);
        println!("Blocks used: {}", metadata.blocks_used);

        println!("\n=== FILES CREATED ===");
        println!("demo_cover_image.png - Synthetic cover image");
        println!("demo_stego_image.png - Stego image with hidden message");
        println!("demo_encryption.key - Encryption key for manual testing");

        println!("\n=== MANUAL TEST COMMAND ===");
        println!("imgstego decode -i demo_stego_image.png -k demo_encryption.key");

        Ok(())
    }

    fn get_or_generate_encryption_key(
        &self,
        output_path: &str,
        key_file_path: Option<String>,
    ) -> Result<[u8; 32]> {
        match key_file_path {
            Some(key_path) => {
                if Path::new(&key_path).exists() {
                    self.cryptographic_engine.load_key_from_input(&key_path)
                } else {
                    let new_key = CryptographicEngine::generate_encryption_key();
                    self.cryptographic_engine.save_key_to_file(&new_key, &key_path)?;
                    println!("Generated new encryption key and saved to: {}", key_path);
                    Ok(new_key)
                }
            }
            None => {
                let new_key = CryptographicEngine::generate_encryption_key();
                let auto_key_path = format!("{}.key", output_path);
                self.cryptographic_engine.save_key_to_file(&new_key, &auto_key_path)?;
                println!("Generated new encryption key and saved to: {}", auto_key_path);
                Ok(new_key)
            }
        }
    }
}

impl Default for CommandLineHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_png_path(output_path: &str) -> String {
    if output_path.ends_with(".png") {
        output_path.to_string()
    } else {
        format!("{}.png", output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_png_path_adds_extension_once() {
        assert_eq!(normalize_png_path("out"), "out.png");
        assert_eq!(normalize_png_path("out.png"), "out.png");
    }
}
