use crate::version_error::PeVersionError;

const DOS_MAGIC: u16 = 0x5A4D;
const DOS_PE_POINTER: usize = 0x3C;
const PE_SIGNATURE: u32 = 0x0000_4550;
const COFF_HEADER_SIZE: usize = 20;
const SECTION_HEADER_SIZE: usize = 40;
const PE32_MAGIC: u16 = 0x10B;
const PE32_PLUS_MAGIC: u16 = 0x20B;
const RESOURCE_DIRECTORY_INDEX: usize = 2;
const RESOURCE_SUBDIRECTORY: u32 = 0x8000_0000;
const RESOURCE_TREE_DEPTH: usize = 3;
const RT_VERSION: u32 = 16;
const VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
const STRING_FILE_INFO_KEY: &str = "StringFileInfo";
const FILE_VERSION_KEY: &str = "FileVersion";
const TEXT_VALUE: u16 = 1;

/// Bounds-checked little-endian reads over a byte slice.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], PeVersionError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(PeVersionError::OutOfBounds { offset, len })
    }

    fn u16(&self, offset: usize) -> Result<u16, PeVersionError> {
        let bytes = self.bytes(offset, 2)?;

        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&self, offset: usize) -> Result<u32, PeVersionError> {
        let bytes = self.bytes(offset, 4)?;

        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[derive(Clone, Copy, Debug)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_offset: u32,
    raw_size: u32,
}

impl Section {
    fn file_offset(&self, rva: u32) -> Option<usize> {
        let span = self.virtual_size.max(self.raw_size);
        let end = self.virtual_address.checked_add(span)?;

        if rva >= self.virtual_address && rva < end {
            Some((rva - self.virtual_address) as usize + self.raw_offset as usize)
        } else {
            None
        }
    }
}

struct PeImage<'a> {
    reader: Reader<'a>,
    sections: Vec<Section>,
    resource_rva: u32,
}

impl<'a> PeImage<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, PeVersionError> {
        let reader = Reader::new(data);

        if reader.u16(0).ok() != Some(DOS_MAGIC) {
            return Err(PeVersionError::InvalidDosHeader);
        }

        let pe_offset = reader.u32(DOS_PE_POINTER)? as usize;

        if reader.u32(pe_offset)? != PE_SIGNATURE {
            return Err(PeVersionError::InvalidPeSignature(pe_offset));
        }

        let coff_offset = pe_offset + 4;
        let section_count = reader.u16(coff_offset + 2)? as usize;
        let optional_size = reader.u16(coff_offset + 16)? as usize;
        let optional_offset = coff_offset + COFF_HEADER_SIZE;

        // The data directory table moves depending on PE32 vs PE32+
        let (count_offset, directories_offset) = match reader.u16(optional_offset)? {
            PE32_MAGIC => (92, 96),
            PE32_PLUS_MAGIC => (108, 112),
            magic => return Err(PeVersionError::UnknownOptionalHeader(magic)),
        };

        let directory_count = reader.u32(optional_offset + count_offset)? as usize;

        if directory_count <= RESOURCE_DIRECTORY_INDEX {
            return Err(PeVersionError::MissingResourceDirectory);
        }

        let directory_offset =
            optional_offset + directories_offset + RESOURCE_DIRECTORY_INDEX * 8;
        let resource_rva = reader.u32(directory_offset)?;
        let resource_size = reader.u32(directory_offset + 4)?;

        if resource_rva == 0 || resource_size == 0 {
            return Err(PeVersionError::MissingResourceDirectory);
        }

        let table_offset = optional_offset + optional_size;
        let mut sections = Vec::with_capacity(section_count);

        for index in 0..section_count {
            let base = table_offset + index * SECTION_HEADER_SIZE;

            sections.push(Section {
                virtual_size: reader.u32(base + 8)?,
                virtual_address: reader.u32(base + 12)?,
                raw_size: reader.u32(base + 16)?,
                raw_offset: reader.u32(base + 20)?,
            });
        }

        Ok(Self {
            reader,
            sections,
            resource_rva,
        })
    }

    fn file_offset(&self, rva: u32) -> Result<usize, PeVersionError> {
        self.sections
            .iter()
            .find_map(|section| section.file_offset(rva))
            .ok_or(PeVersionError::UnmappedAddress(rva))
    }

    fn directory_entries(&self, offset: usize) -> Result<Vec<(u32, u32)>, PeVersionError> {
        let named = self.reader.u16(offset + 12)? as usize;
        let ids = self.reader.u16(offset + 14)? as usize;
        let mut entries = Vec::with_capacity(named + ids);

        for index in 0..(named + ids) {
            let base = offset + 16 + index * 8;

            entries.push((self.reader.u32(base)?, self.reader.u32(base + 4)?));
        }

        Ok(entries)
    }

    fn version_resource(&self) -> Result<&'a [u8], PeVersionError> {
        let root = self.file_offset(self.resource_rva)?;

        // Type level: look for the version resource type by ID. Named
        // entries have their high bit set and never compare equal.
        let mut node = self
            .directory_entries(root)?
            .into_iter()
            .find(|(name, _)| *name == RT_VERSION)
            .map(|(_, target)| target)
            .ok_or(PeVersionError::MissingVersionResource)?;

        // Name and language levels: the first entry wins.
        for _ in 1..RESOURCE_TREE_DEPTH {
            if node & RESOURCE_SUBDIRECTORY == 0 {
                break;
            }

            let directory = root + (node & !RESOURCE_SUBDIRECTORY) as usize;

            node = self
                .directory_entries(directory)?
                .first()
                .map(|(_, target)| *target)
                .ok_or(PeVersionError::MissingVersionResource)?;
        }

        if node & RESOURCE_SUBDIRECTORY != 0 {
            return Err(PeVersionError::MalformedVersionInfo(
                "resource tree is deeper than expected",
            ));
        }

        let entry = root + node as usize;
        let data_rva = self.reader.u32(entry)?;
        let data_size = self.reader.u32(entry + 4)? as usize;

        self.reader.bytes(self.file_offset(data_rva)?, data_size)
    }
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

/// A node of the `VS_VERSIONINFO` tree. Every node shares the same
/// header layout: length, value length, type, then a UTF-16 key.
#[derive(Debug)]
struct VersionBlock<'a> {
    length: usize,
    key: String,
    value: &'a [u8],
    children: &'a [u8],
}

impl<'a> VersionBlock<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, PeVersionError> {
        let reader = Reader::new(data);
        let length = reader.u16(0)? as usize;

        if length < 6 || length > data.len() {
            return Err(PeVersionError::MalformedVersionInfo(
                "block length exceeds the resource",
            ));
        }

        let block = &data[..length];
        let reader = Reader::new(block);
        let value_length = reader.u16(2)? as usize;
        let value_type = reader.u16(4)?;

        let mut key = vec![];
        let mut cursor = 6;

        loop {
            let unit = reader
                .u16(cursor)
                .map_err(|_| PeVersionError::MalformedVersionInfo("unterminated block key"))?;
            cursor += 2;

            if unit == 0 {
                break;
            }

            key.push(unit);
        }

        // Text values declare their length in UTF-16 units
        let value_bytes = if value_type == TEXT_VALUE {
            value_length * 2
        } else {
            value_length
        };
        let value_start = align4(cursor).min(length);
        let value_end = (value_start + value_bytes).min(length);
        let children_start = align4(value_end).min(length);

        Ok(Self {
            length,
            key: String::from_utf16_lossy(&key),
            value: &block[value_start..value_end],
            children: &block[children_start..],
        })
    }

    fn children(&self) -> Result<Vec<VersionBlock<'a>>, PeVersionError> {
        let mut blocks = vec![];
        let mut offset = 0;

        while offset + 6 <= self.children.len() {
            let remaining = &self.children[offset..];

            // Trailing zero padding is not a block
            if remaining.iter().all(|byte| *byte == 0) {
                break;
            }

            let block = VersionBlock::parse(remaining)?;

            offset = align4(offset + block.length);
            blocks.push(block);
        }

        Ok(blocks)
    }

    fn text(&self) -> String {
        let units = self
            .value
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect::<Vec<_>>();

        String::from_utf16_lossy(&units)
    }
}

/// Locate the raw `VS_VERSIONINFO` resource of a PE binary.
pub fn read_version_resource(bytes: &[u8]) -> Result<&[u8], PeVersionError> {
    PeImage::parse(bytes)?.version_resource()
}

/// Find a string value (for example "ProductName") across every string
/// table of a `VS_VERSIONINFO` resource.
pub fn find_version_string(info: &[u8], name: &str) -> Result<Option<String>, PeVersionError> {
    let root = VersionBlock::parse(info)?;

    if root.key != VERSION_INFO_KEY {
        return Err(PeVersionError::MalformedVersionInfo(
            "root block is not VS_VERSION_INFO",
        ));
    }

    for child in root.children()? {
        // VarFileInfo and anything else is skipped
        if child.key != STRING_FILE_INFO_KEY {
            continue;
        }

        for table in child.children()? {
            for entry in table.children()? {
                if entry.key == name {
                    return Ok(Some(entry.text().trim().to_owned()));
                }
            }
        }
    }

    Ok(None)
}

/// Read the `FileVersion` string of a PE binary held in memory.
pub fn read_file_version(bytes: &[u8]) -> Result<String, PeVersionError> {
    let info = read_version_resource(bytes)?;

    match find_version_string(info, FILE_VERSION_KEY)? {
        Some(version) if !version.is_empty() => Ok(version),
        _ => Err(PeVersionError::MissingFileVersion),
    }
}
