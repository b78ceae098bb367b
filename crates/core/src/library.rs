use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const UNKNOWN_LIBRARY_LABEL: &str = "Unknown DLL type";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum LibraryGroup {
    DirectStorage,
    Dlss,
    Fsr,
    Streamline,
    XeSS,
}

impl fmt::Display for LibraryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectStorage => "DirectStorage",
            Self::Dlss => "DLSS",
            Self::Fsr => "FSR",
            Self::Streamline => "Streamline",
            Self::XeSS => "XeSS",
        })
    }
}

#[derive(Debug)]
pub struct KnownLibrary {
    pub file_name: &'static str,
    pub label: &'static str,
    pub group: LibraryGroup,
}

macro_rules! known {
    ($file:literal, $label:literal, $group:ident) => {
        KnownLibrary {
            file_name: $file,
            label: $label,
            group: LibraryGroup::$group,
        }
    };
}

pub static KNOWN_LIBRARIES: &[KnownLibrary] = &[
    known!("nvngx_dlss.dll", "DLSS DLL", Dlss),
    known!("nvngx_dlssg.dll", "DLSS Frame Generation DLL", Dlss),
    known!("nvngx_dlssd.dll", "DLSS Ray Reconstruction DLL", Dlss),
    known!("libxess.dll", "XeSS DLL", XeSS),
    known!("libxess_dx11.dll", "XeSS DX11 DLL", XeSS),
    known!("dstorage.dll", "DirectStorage DLL", DirectStorage),
    known!("dstoragecore.dll", "DirectStorage Core DLL", DirectStorage),
    known!("sl.common.dll", "Streamline Shared Library DLL", Streamline),
    known!("sl.dlss.dll", "Streamline DLSS Super Resolution DLL", Streamline),
    known!("sl.dlss_g.dll", "Streamline DLSS Frame Generation DLL", Streamline),
    known!("sl.interposer.dll", "Streamline Graphics API Interception DLL", Streamline),
    known!("sl.pcl.dll", "Streamline Parameter/Platform Configuration DLL", Streamline),
    known!("sl.reflex.dll", "Streamline Reflex Low-Latency DLL", Streamline),
    known!("amd_fidelityfx_vk.dll", "AMD FidelityFX Super Resolution (FSR) Vulkan DLL", Fsr),
    known!("amd_fidelityfx_dx12.dll", "AMD FidelityFX Super Resolution (FSR) DirectX 12 DLL", Fsr),
];

/// Artifacts that are shipped under one name and installed under another.
pub static RENAMED_LIBRARIES: &[(&str, &str)] =
    &[("amd_fidelityfx_loader_dx12.dll", "amd_fidelityfx_dx12.dll")];

/// The file name of a path, lowercased for table lookups.
pub fn lowercase_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

/// Return the installed name for an artifact that must be renamed.
pub fn rename_target_for(artifact_name: &str) -> Option<&'static str> {
    let artifact_name = artifact_name.to_lowercase();

    RENAMED_LIBRARIES
        .iter()
        .find(|(artifact, _)| *artifact == artifact_name)
        .map(|(_, installed)| *installed)
}

/// The resolved type tag of a target library.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LibraryType {
    pub file_name: String,
    pub label: String,
    pub group: Option<LibraryGroup>,
}

impl LibraryType {
    pub fn from_file_name(name: &str) -> Self {
        let file_name = name.to_lowercase();

        match KNOWN_LIBRARIES
            .iter()
            .find(|library| library.file_name == file_name)
        {
            Some(library) => Self {
                file_name,
                label: library.label.to_owned(),
                group: Some(library.group),
            },
            None => Self {
                file_name,
                label: UNKNOWN_LIBRARY_LABEL.to_owned(),
                group: None,
            },
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_file_name(&lowercase_file_name(path).unwrap_or_default())
    }

    pub fn is_known(&self) -> bool {
        self.group.is_some()
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
