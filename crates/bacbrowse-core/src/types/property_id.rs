numbered_enum! {
    /// Property identifiers the browse client refers to by name. Every other
    /// identifier, standard or vendor-specific, is carried as
    /// [`PropertyId::Other`].
    pub enum PropertyId(u32) {
        All = 8,
        Description = 28,
        ModelName = 70,
        ObjectIdentifier = 75,
        ObjectList = 76,
        ObjectName = 77,
        ObjectType = 79,
        PresentValue = 85,
        StatusFlags = 111,
        Units = 117,
        VendorName = 121,
        PropertyList = 371,
    }
    other = Other;
}
