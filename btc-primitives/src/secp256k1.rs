//! The Bitcoin curve: y^2 = x^3 + 7 over the 256-bit prime field, with the
//! published generator and order. Cofactor 1.

use crate::curve::CurveParams;
use crate::u256::U256;

/// p = 2^256 - 2^32 - 977.
pub static SECP256K1: CurveParams = CurveParams {
    name: "secp256k1",
    p: U256::new(
        0xffff_ffff_ffff_ffff_ffff_ffff_ffff_ffff,
        0xffff_ffff_ffff_ffff_ffff_fffe_ffff_fc2f,
    ),
    a: U256::new(0, 0),
    b: U256::new(0, 7),
    gx: U256::new(
        0x79be_667e_f9dc_bbac_55a0_6295_ce87_0b07,
        0x029b_fcdb_2dce_28d9_59f2_815b_16f8_1798,
    ),
    gy: U256::new(
        0x483a_da77_26a3_c465_5da4_fbfc_0e11_08a8,
        0xfd17_b448_a685_5419_9c47_d08f_fb10_d4b8,
    ),
    n: U256::new(
        0xffff_ffff_ffff_ffff_ffff_ffff_ffff_fffe,
        0xbaae_dce6_af48_a03b_bfd2_5e8c_d036_4141,
    ),
};
