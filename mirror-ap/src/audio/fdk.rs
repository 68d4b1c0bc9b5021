//! AAC decoding through libfdk-aac
//!
//! The only backend able to decode AAC-ELD, which is what mirroring senders
//! emit. Runs the library in raw (headerless) transport mode, which the safe
//! wrapper crates do not expose, so this module talks to `fdk-aac-sys`
//! directly. All `unsafe` for the codec stays in this file.

use crate::audio::asc::AudioSpecificConfig;
use crate::audio::decoder::{CodecBackend, FrameDecoder, StreamInfo};
use crate::error::{Error, Result};
use fdk_aac_sys as sys;

/// Allocates raw-transport fdk-aac decoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct FdkAacBackend;

impl CodecBackend for FdkAacBackend {
    fn name(&self) -> &'static str {
        "fdk-aac"
    }

    fn open(&self) -> Result<Box<dyn FrameDecoder>> {
        let handle = DecoderHandle::open_raw()?;
        Ok(Box::new(FdkAacDecoder {
            handle: Some(handle),
            object_type: 0,
        }))
    }
}

/// Owned `HANDLE_AACDECODER`, closed on drop.
struct DecoderHandle(sys::HANDLE_AACDECODER);

// SAFETY: libfdk-aac decoder instances carry no thread affinity. The handle is
// only reachable through `&mut FdkAacDecoder`, so calls never overlap.
unsafe impl Send for DecoderHandle {}

impl DecoderHandle {
    fn open_raw() -> Result<Self> {
        // SAFETY: plain allocation call; a NULL result is checked below.
        let raw = unsafe { sys::aacDecoder_Open(sys::TRANSPORT_TYPE_TT_MP4_RAW, 1) };
        if raw.is_null() {
            return Err(Error::DecoderInit(
                "aacDecoder_Open returned no decoder".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    fn config_raw(&mut self, asc: &[u8]) -> std::result::Result<(), sys::AAC_DECODER_ERROR> {
        let mut conf = asc.as_ptr() as *mut u8;
        let length = asc.len() as u32;
        // SAFETY: the library reads `length` bytes through `conf` and does not
        // write through or retain the pointer.
        check(unsafe { sys::aacDecoder_ConfigRaw(self.0, &mut conf, &length) })
    }

    fn fill(&mut self, data: &[u8]) -> std::result::Result<usize, sys::AAC_DECODER_ERROR> {
        let mut buffer = data.as_ptr() as *mut u8;
        let size = data.len() as u32;
        let mut bytes_valid = size;
        // SAFETY: as for config_raw; the input is copied into the decoder's
        // own buffer and `bytes_valid` reports what was left unconsumed.
        check(unsafe { sys::aacDecoder_Fill(self.0, &mut buffer, &size, &mut bytes_valid) })?;
        Ok((size - bytes_valid) as usize)
    }

    fn decode_frame(&mut self, pcm: &mut [i16]) -> std::result::Result<(), sys::AAC_DECODER_ERROR> {
        // SAFETY: the library writes at most `pcm.len()` samples.
        check(unsafe {
            sys::aacDecoder_DecodeFrame(self.0, pcm.as_mut_ptr(), pcm.len() as i32, 0)
        })
    }

    fn stream_info(&self) -> Option<&sys::CStreamInfo> {
        // SAFETY: the returned struct lives inside the decoder instance and
        // stays valid until the handle is closed, which needs `&mut self`.
        unsafe { sys::aacDecoder_GetStreamInfo(self.0).as_ref() }
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from aacDecoder_Open and is closed once.
        unsafe { sys::aacDecoder_Close(self.0) };
    }
}

fn check(code: sys::AAC_DECODER_ERROR) -> std::result::Result<(), sys::AAC_DECODER_ERROR> {
    if code == sys::AAC_DECODER_ERROR_AAC_DEC_OK {
        Ok(())
    } else {
        Err(code)
    }
}

struct FdkAacDecoder {
    handle: Option<DecoderHandle>,
    /// Object type of the applied configuration
    object_type: u32,
}

impl FdkAacDecoder {
    fn inner(&mut self) -> Result<&mut DecoderHandle> {
        self.handle
            .as_mut()
            .ok_or_else(|| Error::InvalidState("fdk-aac decoder closed".to_string()))
    }
}

impl FrameDecoder for FdkAacDecoder {
    fn configure_raw(&mut self, config: &AudioSpecificConfig) -> Result<()> {
        self.inner()?
            .config_raw(config.as_bytes())
            .map_err(|code| Error::DecoderConfig(format!("Unable to set raw config: 0x{:x}", code)))?;
        self.object_type = config.object_type();
        Ok(())
    }

    fn stream_info(&self) -> Option<StreamInfo> {
        let info = self.handle.as_ref()?.stream_info()?;
        Some(StreamInfo {
            channels: info.channelConfig as u32,
            sample_rate: info.aacSampleRate as u32,
            samples_per_frame: info.aacSamplesPerFrame as u32,
            object_type: self.object_type,
            bitrate: info.bitRate as u32,
        })
    }

    fn fill(&mut self, data: &[u8]) -> Result<usize> {
        self.inner()?
            .fill(data)
            .map_err(|code| Error::DecodeFill(format!("aacDecoder_Fill failed: 0x{:x}", code)))
    }

    fn decode_frame(&mut self, pcm: &mut [i16]) -> Result<usize> {
        let handle = self.inner()?;
        handle
            .decode_frame(pcm)
            .map_err(|code| Error::DecodeFrame(format!("aacDecoder_DecodeFrame failed: 0x{:x}", code)))?;
        let produced = handle
            .stream_info()
            .map(|info| (info.frameSize.max(0) * info.numChannels.max(0)) as usize)
            .unwrap_or(0);
        Ok(produced)
    }

    fn close(&mut self) {
        // Dropping the handle runs aacDecoder_Close
        self.handle.take();
    }
}
