//! HEIC/HEIF decoding through the system libheif, loaded at runtime.
//!
//! HEVC has no pure-Rust decoder, so phone photos go through the C
//! library platforms already ship. Loading it at runtime keeps the build
//! free of libheif headers; when the library is missing, decoding fails
//! with a message the form can show instead of uploading raw HEIC.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::ptr;
use std::sync::LazyLock;

use anyhow::{anyhow, bail, Context};
use image::{DynamicImage, RgbImage};
use libloading::Library;

// Stable values from heif.h.
const HEIF_COLORSPACE_RGB: c_int = 1;
const HEIF_CHROMA_INTERLEAVED_RGB: c_int = 10;
const HEIF_CHANNEL_INTERLEAVED: c_int = 10;

/// `struct heif_error`, returned by value from every fallible call.
#[repr(C)]
struct RawError {
    code: c_int,
    subcode: c_int,
    message: *const c_char,
}

impl RawError {
    fn ok(&self) -> bool {
        self.code == 0
    }

    fn message(&self) -> String {
        if self.message.is_null() {
            return format!("libheif error {}", self.code);
        }
        unsafe { CStr::from_ptr(self.message) }
            .to_string_lossy()
            .into_owned()
    }
}

type ContextAlloc = unsafe extern "C" fn() -> *mut c_void;
type ContextFree = unsafe extern "C" fn(*mut c_void);
type ReadFromMemory =
    unsafe extern "C" fn(*mut c_void, *const c_void, usize, *const c_void) -> RawError;
type PrimaryHandle = unsafe extern "C" fn(*mut c_void, *mut *mut c_void) -> RawError;
type HandleRelease = unsafe extern "C" fn(*mut c_void);
type DecodeImage =
    unsafe extern "C" fn(*mut c_void, *mut *mut c_void, c_int, c_int, *const c_void) -> RawError;
type GetDimension = unsafe extern "C" fn(*mut c_void, c_int) -> c_int;
type GetPlane = unsafe extern "C" fn(*mut c_void, c_int, *mut c_int) -> *const u8;
type ImageRelease = unsafe extern "C" fn(*mut c_void);

struct LibHeif {
    context_alloc: ContextAlloc,
    context_free: ContextFree,
    read_from_memory: ReadFromMemory,
    primary_handle: PrimaryHandle,
    handle_release: HandleRelease,
    decode_image: DecodeImage,
    get_width: GetDimension,
    get_height: GetDimension,
    get_plane: GetPlane,
    image_release: ImageRelease,
    _lib: Library,
}

static LIBHEIF: LazyLock<Result<LibHeif, String>> =
    LazyLock::new(|| LibHeif::load().map_err(|e| e.to_string()));

/// Decode the primary image of a HEIC/HEIF payload to 8-bit RGB.
pub fn decode(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    match &*LIBHEIF {
        Ok(lib) => lib.decode_rgb(bytes),
        Err(e) => bail!("HEIC support unavailable ({})", e),
    }
}

impl LibHeif {
    fn load() -> anyhow::Result<Self> {
        let lib = Self::open()?;
        unsafe {
            Ok(Self {
                context_alloc: *lib.get(b"heif_context_alloc")?,
                context_free: *lib.get(b"heif_context_free")?,
                read_from_memory: *lib.get(b"heif_context_read_from_memory_without_copy")?,
                primary_handle: *lib.get(b"heif_context_get_primary_image_handle")?,
                handle_release: *lib.get(b"heif_image_handle_release")?,
                decode_image: *lib.get(b"heif_decode_image")?,
                get_width: *lib.get(b"heif_image_get_width")?,
                get_height: *lib.get(b"heif_image_get_height")?,
                get_plane: *lib.get(b"heif_image_get_plane_readonly")?,
                image_release: *lib.get(b"heif_image_release")?,
                _lib: lib,
            })
        }
    }

    fn open() -> anyhow::Result<Library> {
        let candidates = [
            "libheif.so.1",
            "libheif.so",
            "libheif.1.dylib",
            "libheif.dylib",
        ];
        let mut last = None;
        for name in candidates {
            match unsafe { Library::new(name) } {
                Ok(lib) => return Ok(lib),
                Err(e) => last = Some(e),
            }
        }
        Err(match last {
            Some(e) => anyhow!("libheif not found: {}", e),
            None => anyhow!("libheif not found"),
        })
    }

    fn decode_rgb(&self, bytes: &[u8]) -> anyhow::Result<DynamicImage> {
        unsafe {
            let ctx = (self.context_alloc)();
            if ctx.is_null() {
                bail!("heif context allocation failed");
            }
            let result = self.decode_in_context(ctx, bytes);
            (self.context_free)(ctx);
            result
        }
    }

    /// The context owns nothing of `bytes` after return; the caller frees
    /// the context on every path.
    unsafe fn decode_in_context(
        &self,
        ctx: *mut c_void,
        bytes: &[u8],
    ) -> anyhow::Result<DynamicImage> {
        let err = (self.read_from_memory)(ctx, bytes.as_ptr().cast(), bytes.len(), ptr::null());
        if !err.ok() {
            bail!("parse heif container: {}", err.message());
        }

        let mut handle = ptr::null_mut();
        let err = (self.primary_handle)(ctx, &mut handle);
        if !err.ok() {
            bail!("primary image handle: {}", err.message());
        }

        let mut img = ptr::null_mut();
        let err = (self.decode_image)(
            handle,
            &mut img,
            HEIF_COLORSPACE_RGB,
            HEIF_CHROMA_INTERLEAVED_RGB,
            ptr::null(),
        );
        (self.handle_release)(handle);
        if !err.ok() {
            bail!("decode heif image: {}", err.message());
        }

        let width = (self.get_width)(img, HEIF_CHANNEL_INTERLEAVED);
        let height = (self.get_height)(img, HEIF_CHANNEL_INTERLEAVED);
        let mut stride: c_int = 0;
        let data = (self.get_plane)(img, HEIF_CHANNEL_INTERLEAVED, &mut stride);
        if width <= 0 || height <= 0 || stride <= 0 || data.is_null() {
            (self.image_release)(img);
            bail!("heif image has no interleaved RGB plane");
        }

        let (width, height, stride) = (width as usize, height as usize, stride as usize);
        let mut rgb = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            let line = std::slice::from_raw_parts(data.add(row * stride), width * 3);
            rgb.extend_from_slice(line);
        }
        (self.image_release)(img);

        let buf = RgbImage::from_raw(width as u32, height as u32, rgb)
            .context("assemble decoded image")?;
        Ok(DynamicImage::ImageRgb8(buf))
    }
}
