//! SidecarStore (C5): the per-audio-file `<audio>.25d` cache.
//!
//! Binary layout per spec §6.2, 268 bytes total:
//!
//! ```text
//! offset size field
//!   0    4    magic = "A25D"
//!   4    2    format_version (u16 LE)
//!   6    2    fingerprint_version (u16 LE)
//!   8    8    audio_size_bytes (u64 LE)
//!  16    8    audio_mtime_ns (u64 LE)
//!  24   32    audio_sha256 (unused; zeros)
//!  56    8    created_at_unix_sec (i64 LE)
//!  64  200    payload = 25 x f64 LE
//! 264    4    crc32(header[0..264])
//! ```

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CacheError;
use crate::models::{Fingerprint, FINGERPRINT_VERSION};

const MAGIC: &[u8; 4] = b"A25D";
const FORMAT_VERSION: u16 = 1;
const RECORD_LEN: usize = 268;
const PAYLOAD_OFFSET: usize = 64;
const PAYLOAD_LEN: usize = 200;
const CRC_OFFSET: usize = 264;

/// Audio-file identity used to validate a sidecar against its source
/// (§3.2's `(size, mtime)` binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioIdentity {
    pub size_bytes: u64,
    pub mtime_ns: u64,
}

impl AudioIdentity {
    pub fn from_path(audio_path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(audio_path)?;
        let mtime_ns = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Ok(Self { size_bytes: meta.len(), mtime_ns })
    }
}

fn sidecar_path(audio_path: &Path) -> PathBuf {
    let mut p = audio_path.as_os_str().to_owned();
    p.push(".25d");
    PathBuf::from(p)
}

/// Reads and validates the sidecar for `audio_path`. Returns `None` on any
/// validity failure (§3.2) and deletes the invalid file, so a later write
/// starts clean.
pub fn read(audio_path: &Path) -> Option<Fingerprint> {
    let path = sidecar_path(audio_path);
    let identity = AudioIdentity::from_path(audio_path).ok()?;

    match read_validated(&path, identity) {
        Ok(fp) => Some(fp),
        Err(_) => {
            let _ = fs::remove_file(&path);
            None
        }
    }
}

fn read_validated(path: &Path, identity: AudioIdentity) -> Result<Fingerprint, CacheError> {
    let mut buf = Vec::with_capacity(RECORD_LEN);
    File::open(path)?.read_to_end(&mut buf)?;
    if buf.len() != RECORD_LEN {
        return Err(CacheError::Corrupt(format!("bad length {}", buf.len())));
    }
    if &buf[0..4] != MAGIC {
        return Err(CacheError::Corrupt("bad magic".to_string()));
    }
    let format_version = u16::from_le_bytes([buf[4], buf[5]]);
    if format_version != FORMAT_VERSION {
        return Err(CacheError::Corrupt(format!("unsupported format_version {format_version}")));
    }
    let fingerprint_version = u16::from_le_bytes([buf[6], buf[7]]);
    if fingerprint_version != FINGERPRINT_VERSION {
        return Err(CacheError::VersionMismatch { expected: FINGERPRINT_VERSION, found: fingerprint_version });
    }

    let size_bytes = u64::from_le_bytes(buf[8..16].try_into().unwrap());
    let mtime_ns = u64::from_le_bytes(buf[16..24].try_into().unwrap());
    if size_bytes != identity.size_bytes || mtime_ns != identity.mtime_ns {
        return Err(CacheError::Corrupt("audio identity mismatch".to_string()));
    }

    let stored_crc = u32::from_le_bytes(buf[CRC_OFFSET..CRC_OFFSET + 4].try_into().unwrap());
    let computed_crc = crc32fast::hash(&buf[0..CRC_OFFSET]);
    if stored_crc != computed_crc {
        return Err(CacheError::Corrupt("checksum mismatch".to_string()));
    }

    let mut fp = Fingerprint { fingerprint_version, ..Fingerprint::default() };
    let payload = &buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + PAYLOAD_LEN];
    for (i, chunk) in payload.chunks_exact(8).enumerate() {
        let v = f64::from_le_bytes(chunk.try_into().unwrap());
        set_dimension(&mut fp, i, v);
    }

    if !fp.is_valid() {
        return Err(CacheError::Corrupt("payload failed sanitization".to_string()));
    }

    Ok(fp)
}

/// Writes `fp` for `audio_path`, atomically: write to `<path>.25d.tmp`,
/// fsync, rename. Never leaves a partially-visible file (P10).
pub fn write(audio_path: &Path, fp: &Fingerprint) -> Result<(), CacheError> {
    let identity = AudioIdentity::from_path(audio_path)?;
    let path = sidecar_path(audio_path);
    let tmp_path = {
        let mut p = path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    let mut buf = vec![0u8; RECORD_LEN];
    buf[0..4].copy_from_slice(MAGIC);
    buf[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf[6..8].copy_from_slice(&fp.fingerprint_version.to_le_bytes());
    buf[8..16].copy_from_slice(&identity.size_bytes.to_le_bytes());
    buf[16..24].copy_from_slice(&identity.mtime_ns.to_le_bytes());
    // 24..56 sha256 left as zeros (unused per §9 open question on identity key)
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    buf[56..64].copy_from_slice(&created_at.to_le_bytes());

    for i in 0..25 {
        let v = dimension(fp, i);
        let off = PAYLOAD_OFFSET + i * 8;
        buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
    }

    let crc = crc32fast::hash(&buf[0..CRC_OFFSET]);
    buf[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());

    let mut file = File::create(&tmp_path)?;
    file.write_all(&buf)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, &path)?;
    Ok(())
}

pub fn invalidate(audio_path: &Path) -> std::io::Result<()> {
    let path = sidecar_path(audio_path);
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn is_valid(audio_path: &Path) -> bool {
    read(audio_path).is_some()
}

fn dimension(fp: &Fingerprint, i: usize) -> f64 {
    [
        fp.sub_bass_pct,
        fp.bass_pct,
        fp.low_mid_pct,
        fp.mid_pct,
        fp.upper_mid_pct,
        fp.presence_pct,
        fp.air_pct,
        fp.lufs,
        fp.crest_db,
        fp.bass_mid_ratio,
        fp.tempo_bpm,
        fp.rhythm_stability,
        fp.transient_density,
        fp.silence_ratio,
        fp.spectral_centroid,
        fp.spectral_rolloff,
        fp.spectral_flatness,
        fp.harmonic_ratio,
        fp.pitch_stability,
        fp.chroma_energy,
        fp.dynamic_range_variation,
        fp.loudness_variation_std,
        fp.peak_consistency,
        fp.stereo_width,
        fp.phase_correlation,
    ][i]
}

fn set_dimension(fp: &mut Fingerprint, i: usize, v: f64) {
    match i {
        0 => fp.sub_bass_pct = v,
        1 => fp.bass_pct = v,
        2 => fp.low_mid_pct = v,
        3 => fp.mid_pct = v,
        4 => fp.upper_mid_pct = v,
        5 => fp.presence_pct = v,
        6 => fp.air_pct = v,
        7 => fp.lufs = v,
        8 => fp.crest_db = v,
        9 => fp.bass_mid_ratio = v,
        10 => fp.tempo_bpm = v,
        11 => fp.rhythm_stability = v,
        12 => fp.transient_density = v,
        13 => fp.silence_ratio = v,
        14 => fp.spectral_centroid = v,
        15 => fp.spectral_rolloff = v,
        16 => fp.spectral_flatness = v,
        17 => fp.harmonic_ratio = v,
        18 => fp.pitch_stability = v,
        19 => fp.chroma_energy = v,
        20 => fp.dynamic_range_variation = v,
        21 => fp.loudness_variation_std = v,
        22 => fp.peak_consistency = v,
        23 => fp.stereo_width = v,
        24 => fp.phase_correlation = v,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn round_trips_a_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("track.wav");
        File::create(&audio_path).unwrap().write_all(b"fake audio bytes").unwrap();

        let mut fp = Fingerprint { tempo_bpm: 128.0, ..Fingerprint::default() };
        fp.sanitize();
        write(&audio_path, &fp).unwrap();

        let read_back = read(&audio_path).expect("sidecar should validate");
        assert_eq!(read_back.tempo_bpm, 128.0);
        assert_eq!(read_back.fingerprint_version, FINGERPRINT_VERSION);
    }

    #[test]
    fn stale_audio_invalidates_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("track.wav");
        File::create(&audio_path).unwrap().write_all(b"v1").unwrap();

        let mut fp = Fingerprint::default();
        fp.sanitize();
        write(&audio_path, &fp).unwrap();

        // Touch the audio file so its (size, mtime) identity changes.
        std::thread::sleep(std::time::Duration::from_millis(10));
        File::create(&audio_path).unwrap().write_all(b"v2-longer-content").unwrap();

        assert!(read(&audio_path).is_none());
    }

    #[test]
    fn corrupt_checksum_is_rejected_and_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("track.wav");
        File::create(&audio_path).unwrap().write_all(b"fake audio bytes").unwrap();

        let mut fp = Fingerprint::default();
        fp.sanitize();
        write(&audio_path, &fp).unwrap();

        let sidecar = sidecar_path(&audio_path);
        let mut bytes = fs::read(&sidecar).unwrap();
        bytes[PAYLOAD_OFFSET] ^= 0xFF;
        fs::write(&sidecar, &bytes).unwrap();

        assert!(read(&audio_path).is_none());
        assert!(!sidecar.exists());
    }
}
