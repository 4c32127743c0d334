//! Kernel argument sources and binding
//!
//! Callers hand arguments over in one of two layouts, decided once at the API
//! boundary:
//!
//! ```text
//! FlatBuffer:    [ a | pad | x ........ | y ........ ]   offsets applied directly
//! PointerArray:  [ &a, &x, &y ]                          one entry per descriptor
//! ```
//!
//! Binding copies each parameter into a fresh per-launch [`KernelArgs`]
//! image laid out exactly like the kernel's parameter signature.

use launchkit_abi::{CooperativeKernargs, KernargReader, HIDDEN_ARG_ALIGNMENT};

use crate::error::{LaunchError, Result};
use crate::function::ParameterDescriptor;

/// Where a launch takes its argument values from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgumentSource<'a> {
    /// No arguments; only valid for kernels without parameters
    #[default]
    Empty,
    /// A buffer already laid out like the kernel's kernarg segment
    FlatBuffer(&'a [u8]),
    /// One slice per parameter, in descriptor order
    PointerArray(Vec<&'a [u8]>),
}

/// Entries of the legacy "extra" launch-parameter sequence
///
/// The only accepted sequence is
/// `[BufferPointer(buf), BufferSize(len), End]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraParam<'a> {
    BufferPointer(&'a [u8]),
    BufferSize(usize),
    End,
}

impl<'a> ArgumentSource<'a> {
    /// Build a source from the two optional raw forms.
    ///
    /// Supplying both is ambiguous and rejected. An `extra` sequence must be
    /// exactly pointer marker, size marker, terminator.
    pub fn from_raw(kernel_params: Option<Vec<&'a [u8]>>, extra: Option<&[ExtraParam<'a>]>) -> Result<Self> {
        match (kernel_params, extra) {
            (Some(_), Some(_)) => Err(LaunchError::invalid_value(
                "both kernel parameters and extra parameters supplied; only one is allowed",
            )),
            (Some(params), None) => Ok(Self::PointerArray(params)),
            (None, Some(extra)) => Self::from_extra(extra),
            (None, None) => Ok(Self::Empty),
        }
    }

    fn from_extra(extra: &[ExtraParam<'a>]) -> Result<Self> {
        match extra {
            [ExtraParam::BufferPointer(buffer), ExtraParam::BufferSize(size), ExtraParam::End] => {
                let buffer = buffer.get(..*size).ok_or_else(|| {
                    LaunchError::invalid_value(format!(
                        "extra buffer size {} exceeds the {} bytes supplied",
                        size,
                        buffer.len()
                    ))
                })?;
                Ok(Self::FlatBuffer(buffer))
            }
            _ => Err(LaunchError::invalid_value(
                "extra parameters must be [BufferPointer, BufferSize, End]",
            )),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::FlatBuffer(buffer) => buffer.is_empty(),
            Self::PointerArray(pointers) => pointers.is_empty(),
        }
    }
}

/// Location of one bound parameter inside a [`KernelArgs`] image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundArgument {
    pub index: usize,
    pub offset: usize,
    pub size: usize,
    pub is_device_pointer: bool,
}

/// Per-launch kernarg image owned by the dispatch unit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KernelArgs {
    image: Vec<u8>,
    entries: Vec<BoundArgument>,
    hidden_offset: Option<usize>,
}

impl KernelArgs {
    /// Packed bytes exactly as the device reads them
    pub fn as_bytes(&self) -> &[u8] {
        &self.image
    }

    pub fn entries(&self) -> &[BoundArgument] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of the `index`-th parameter
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let entry = self.entries.get(index)?;
        self.image.get(entry.offset..entry.offset + entry.size)
    }

    /// Values of every device-pointer parameter, for dependency tracking
    pub fn device_pointers(&self) -> impl Iterator<Item = u64> + '_ {
        let mut reader = KernargReader::new(&self.image);
        self.entries
            .iter()
            .filter(|entry| entry.is_device_pointer && entry.size == 8)
            .filter_map(move |entry| {
                reader.seek(entry.offset);
                reader.read_device_ptr().ok()
            })
    }

    /// Offset of the hidden cooperative block, if one was appended
    pub fn hidden_offset(&self) -> Option<usize> {
        self.hidden_offset
    }

    /// Decode the hidden cooperative block, if present
    pub fn cooperative(&self) -> Option<CooperativeKernargs> {
        let offset = self.hidden_offset?;
        CooperativeKernargs::from_bytes(self.image.get(offset..)?)
    }

    /// Append the cooperative block after the explicit parameters
    pub(crate) fn append_cooperative(&mut self, hidden: &CooperativeKernargs) -> Result<()> {
        let offset = self.image.len().next_multiple_of(HIDDEN_ARG_ALIGNMENT);
        let end = offset + CooperativeKernargs::SIZE;
        reserve(&mut self.image, end)?;
        self.image.resize(offset, 0);
        self.image.extend_from_slice(hidden.as_bytes());
        self.hidden_offset = Some(offset);
        Ok(())
    }
}

fn reserve(image: &mut Vec<u8>, total: usize) -> Result<()> {
    let additional = total.saturating_sub(image.len());
    image
        .try_reserve_exact(additional)
        .map_err(|_| LaunchError::OutOfMemory { requested: total })
}

/// Copy every parameter from `source` into a fresh kernarg image.
///
/// Fails without producing a partial image if any parameter cannot be read.
pub fn bind_arguments(source: &ArgumentSource<'_>, params: &[ParameterDescriptor]) -> Result<KernelArgs> {
    let size = params.iter().map(ParameterDescriptor::end).max().unwrap_or(0);
    let mut image = Vec::new();
    reserve(&mut image, size)?;
    image.resize(size, 0);

    let mut entries = Vec::with_capacity(params.len());
    for (index, desc) in params.iter().enumerate() {
        let bytes = read_parameter(source, index, desc)?;
        image[desc.offset..desc.end()].copy_from_slice(bytes);
        entries.push(BoundArgument {
            index,
            offset: desc.offset,
            size: desc.size,
            is_device_pointer: desc.is_device_pointer(),
        });
    }

    tracing::trace!(params = params.len(), bytes = size, "arguments bound");

    Ok(KernelArgs {
        image,
        entries,
        hidden_offset: None,
    })
}

fn read_parameter<'s>(source: &'s ArgumentSource<'_>, index: usize, desc: &ParameterDescriptor) -> Result<&'s [u8]> {
    match source {
        ArgumentSource::Empty => Err(LaunchError::invalid_value(format!(
            "kernel expects parameter {} ({}) but no arguments were supplied",
            index, desc.name
        ))),
        ArgumentSource::FlatBuffer(buffer) => buffer.get(desc.offset..desc.end()).ok_or_else(|| {
            LaunchError::invalid_value(format!(
                "flat argument buffer of {} bytes too short for parameter {} at {}..{}",
                buffer.len(),
                desc.name,
                desc.offset,
                desc.end()
            ))
        }),
        ArgumentSource::PointerArray(pointers) => {
            let value = pointers.get(index).ok_or_else(|| {
                LaunchError::invalid_value(format!("no argument supplied for parameter {}", desc.name))
            })?;
            value.get(..desc.size).ok_or_else(|| {
                LaunchError::invalid_value(format!(
                    "argument for parameter {} has {} bytes, expected {}",
                    desc.name,
                    value.len(),
                    desc.size
                ))
            })
        }
    }
}
