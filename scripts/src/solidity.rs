//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface NFTLiquidationProxy {
        function nftLiquidationImplementation() external view returns (address implementation);
        function pendingNFTLiquidationImplementation() external view returns (address implementation);
        function _setPendingImplementation(address newPendingImplementation) external returns (uint256);
    }
}

sol! {
    #[sol(rpc)]
    interface NFTLiquidationG1 {
        function _become(address proxy) external;
        function initialize() external;
        function initialized() external view returns (bool initialized);

        function comptroller() external view returns (address comptroller);
        function _setComptroller(address newComptroller) external returns (uint256);

        function oEther() external view returns (address oEther);
        function setOEther(address newOEther) external;

        function protocolFeeRecipient() external view returns (address recipient);
        function setProtocolFeeRecipient(address newRecipient) external;

        function protocolFeeMantissa() external view returns (uint256 mantissa);
        function setProtocolFeeMantissa(uint256 newMantissa) external;
    }
}
