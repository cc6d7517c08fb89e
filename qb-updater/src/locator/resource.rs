use crate::version::ProductVersion;

/// `VS_FIXEDFILEINFO.dwSignature`, little endian.
const FIXED_FILE_INFO_SIGNATURE: [u8; 4] = 0xFEEF04BDu32.to_le_bytes();

/// Signature, struct version, file version MS and LS.
const FIXED_FILE_INFO_PREFIX_LEN: usize = 16;

/// Extract the `major.minor.build` file version from the fixed version
/// block embedded in an executable's resources.
///
/// The block is located by its signature; a candidate whose struct version
/// is not 1.x is skipped as a false positive.
pub fn file_version_from_bytes(data: &[u8]) -> Option<ProductVersion> {
    let mut offset = 0;

    while let Some(found) = find(&data[offset..], &FIXED_FILE_INFO_SIGNATURE) {
        let start = offset + found;
        offset = start + 1;

        let Some(block) = data.get(start..start + FIXED_FILE_INFO_PREFIX_LEN) else {
            return None;
        };

        let struct_version = read_u32(&block[4..8]);
        if struct_version >> 16 != 1 {
            continue;
        }

        let version_ms = read_u32(&block[8..12]);
        let version_ls = read_u32(&block[12..16]);

        return Some(ProductVersion::new(
            u64::from(version_ms >> 16),
            u64::from(version_ms & 0xFFFF),
            u64::from(version_ls >> 16),
        ));
    }

    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
pub(crate) fn fixed_file_info(major: u16, minor: u16, build: u16, revision: u16) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&FIXED_FILE_INFO_SIGNATURE);
    block.extend_from_slice(&0x0001_0000u32.to_le_bytes());
    block.extend_from_slice(&((u32::from(major) << 16) | u32::from(minor)).to_le_bytes());
    block.extend_from_slice(&((u32::from(build) << 16) | u32::from(revision)).to_le_bytes());
    // Product version and the remaining fields are irrelevant here.
    block.extend_from_slice(&[0u8; 36]);
    block
}
