use bitflags::bitflags;
use libc::c_int;
use rsmpeg::ffi;

bitflags! {
    /// Demuxer seek flags.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct SeekFlags: c_int {
        const BACKWARD = ffi::AVSEEK_FLAG_BACKWARD as c_int;
        const BYTE     = ffi::AVSEEK_FLAG_BYTE as c_int;
        const ANY      = ffi::AVSEEK_FLAG_ANY as c_int;
        const FRAME    = ffi::AVSEEK_FLAG_FRAME as c_int;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_round_trip() {
        let flags = SeekFlags::BACKWARD;
        assert_eq!(flags.bits(), ffi::AVSEEK_FLAG_BACKWARD as c_int);
        assert_eq!(SeekFlags::from_bits_truncate(flags.bits()), flags);
    }
}
