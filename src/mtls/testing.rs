//! Certificate fixtures for tests.

use rcgen::{
    date_time_ymd, BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
};

/// Shape of a generated client certificate.
pub struct CertSpec {
    pub subject: Vec<(DnType, &'static str)>,
    pub issuer_cn: &'static str,
    pub not_before: (i32, u8, u8),
    pub not_after: (i32, u8, u8),
}

impl Default for CertSpec {
    fn default() -> Self {
        Self {
            subject: vec![
                (DnType::CommonName, "client1"),
                (DnType::OrganizationName, "Acme"),
            ],
            issuer_cn: "TestCA",
            not_before: (2020, 1, 1),
            not_after: (2040, 1, 1),
        }
    }
}

/// Issue a client certificate signed by a throwaway CA and return its DER.
pub fn issue(spec: &CertSpec) -> Vec<u8> {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut ca_dn = DistinguishedName::new();
    ca_dn.push(DnType::CommonName, spec.issuer_cn);
    ca_params.distinguished_name = ca_dn;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["client1.example.com".to_string()]).unwrap();
    let mut dn = DistinguishedName::new();
    for (ty, value) in &spec.subject {
        dn.push(ty.clone(), *value);
    }
    params.distinguished_name = dn;
    let (y, m, d) = spec.not_before;
    params.not_before = date_time_ymd(y, m, d);
    let (y, m, d) = spec.not_after;
    params.not_after = date_time_ymd(y, m, d);

    params.signed_by(&key, &ca, &ca_key).unwrap().der().to_vec()
}
