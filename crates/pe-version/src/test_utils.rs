//! Builders for synthetic PE binaries, so that tests can create
//! libraries with a chosen `FileVersion` without shipping real DLLs.

use crate::ParsedVersion;

const RESOURCE_RVA: u32 = 0x1000;
const FILE_ALIGNMENT: usize = 0x200;
const TEXT_VALUE: u16 = 1;
const BINARY_VALUE: u16 = 0;

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn pad_to(buffer: &mut Vec<u8>, alignment: usize) {
    while buffer.len() % alignment != 0 {
        buffer.push(0);
    }
}

fn utf16z(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}

fn version_block(
    key: &str,
    value: &[u8],
    value_length: u16,
    value_type: u16,
    children: &[Vec<u8>],
) -> Vec<u8> {
    let mut block = vec![0, 0];
    block.extend(value_length.to_le_bytes());
    block.extend(value_type.to_le_bytes());
    block.extend(utf16z(key));
    pad_to(&mut block, 4);
    block.extend(value);

    for child in children {
        pad_to(&mut block, 4);
        block.extend(child);
    }

    let length = block.len() as u16;
    put_u16(&mut block, 0, length);

    block
}

fn string_block(key: &str, value: &str) -> Vec<u8> {
    let text = utf16z(value);

    version_block(key, &text, (text.len() / 2) as u16, TEXT_VALUE, &[])
}

fn resource_directory(section: &mut Vec<u8>, id: u32, target: u32) {
    section.extend([0u8; 12]);
    section.extend(0u16.to_le_bytes());
    section.extend(1u16.to_le_bytes());
    section.extend(id.to_le_bytes());
    section.extend(target.to_le_bytes());
}

#[derive(Clone, Debug)]
pub struct PeBuilder {
    file_version: Option<String>,
    product_name: Option<String>,
    payload: Vec<u8>,
    pe32_plus: bool,
    resources: bool,
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self {
            file_version: None,
            product_name: None,
            payload: vec![],
            pe32_plus: true,
            resources: true,
        }
    }
}

impl PeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_version(mut self, version: impl Into<String>) -> Self {
        self.file_version = Some(version.into());
        self
    }

    pub fn product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    /// Extra bytes appended after the headers, useful to make two
    /// binaries with the same version differ in content.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn pe32(mut self) -> Self {
        self.pe32_plus = false;
        self
    }

    pub fn without_resources(mut self) -> Self {
        self.resources = false;
        self
    }

    fn fixed_file_info(&self) -> Vec<u8> {
        let mut info = vec![0u8; 52];
        put_u32(&mut info, 0, 0xFEEF_04BD);
        put_u32(&mut info, 4, 0x0001_0000);

        if let Some(ParsedVersion::Parsed(version)) =
            self.file_version.as_deref().map(ParsedVersion::parse)
        {
            put_u32(
                &mut info,
                8,
                ((version.major as u32) << 16) | (version.minor as u32 & 0xFFFF),
            );
            put_u32(&mut info, 12, (version.patch as u32) << 16);
        }

        info
    }

    pub fn build_version_info(&self) -> Vec<u8> {
        let mut strings = vec![string_block("CompanyName", "binswap fixtures")];

        if let Some(name) = &self.product_name {
            strings.push(string_block("ProductName", name));
        }

        if let Some(version) = &self.file_version {
            strings.push(string_block("FileVersion", version));
        }

        let table = version_block("040904B0", &[], 0, TEXT_VALUE, &strings);
        let string_info = version_block("StringFileInfo", &[], 0, TEXT_VALUE, &[table]);
        let translation = version_block(
            "Translation",
            &[0x09, 0x04, 0xB0, 0x04],
            4,
            BINARY_VALUE,
            &[],
        );
        let var_info = version_block("VarFileInfo", &[], 0, TEXT_VALUE, &[translation]);
        let fixed = self.fixed_file_info();

        version_block(
            "VS_VERSION_INFO",
            &fixed,
            fixed.len() as u16,
            BINARY_VALUE,
            &[var_info, string_info],
        )
    }

    fn build_resource_section(&self) -> Vec<u8> {
        let info = self.build_version_info();
        let mut section = vec![];

        // Type (RT_VERSION) -> name (1) -> language (en-US) -> data entry
        resource_directory(&mut section, 16, 0x8000_0000 | 0x18);
        resource_directory(&mut section, 1, 0x8000_0000 | 0x30);
        resource_directory(&mut section, 0x409, 0x48);

        section.extend((RESOURCE_RVA + 0x58).to_le_bytes());
        section.extend((info.len() as u32).to_le_bytes());
        section.extend([0u8; 8]);
        section.extend(info);

        section
    }

    pub fn build(&self) -> Vec<u8> {
        let pe_offset = 0x40;
        let coff_offset = pe_offset + 4;
        let optional_offset = coff_offset + 20;
        let optional_size: usize = if self.pe32_plus { 240 } else { 224 };
        let section_table = optional_offset + optional_size;
        let raw_offset = (section_table + 40).div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;

        let section = if self.resources {
            self.build_resource_section()
        } else {
            vec![]
        };
        let raw_size = section.len().div_ceil(FILE_ALIGNMENT) * FILE_ALIGNMENT;

        let mut image = vec![0u8; raw_offset];
        put_u16(&mut image, 0, 0x5A4D);
        put_u32(&mut image, 0x3C, pe_offset as u32);
        put_u32(&mut image, pe_offset, 0x0000_4550);

        put_u16(
            &mut image,
            coff_offset,
            if self.pe32_plus { 0x8664 } else { 0x014C },
        );
        put_u16(&mut image, coff_offset + 2, 1);
        put_u16(&mut image, coff_offset + 16, optional_size as u16);
        put_u16(&mut image, coff_offset + 18, 0x2022);

        let (count_offset, directories_offset) = if self.pe32_plus {
            put_u16(&mut image, optional_offset, 0x20B);
            (108, 112)
        } else {
            put_u16(&mut image, optional_offset, 0x10B);
            (92, 96)
        };

        put_u32(&mut image, optional_offset + count_offset, 16);

        if self.resources {
            let resource_directory = optional_offset + directories_offset + 16;
            put_u32(&mut image, resource_directory, RESOURCE_RVA);
            put_u32(&mut image, resource_directory + 4, section.len() as u32);
        }

        image[section_table..section_table + 8].copy_from_slice(b".rsrc\0\0\0");
        put_u32(&mut image, section_table + 8, section.len() as u32);
        put_u32(&mut image, section_table + 12, RESOURCE_RVA);
        put_u32(&mut image, section_table + 16, raw_size as u32);
        put_u32(&mut image, section_table + 20, raw_offset as u32);

        image.extend(section);
        pad_to(&mut image, FILE_ALIGNMENT);
        image.extend(&self.payload);

        image
    }
}

/// Create a PE32+ library whose `FileVersion` string is `version`.
pub fn fake_dll(version: &str) -> Vec<u8> {
    PeBuilder::new().file_version(version).build()
}
